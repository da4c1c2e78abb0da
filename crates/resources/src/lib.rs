//! DVS Resource Definitions
//!
//! Declarative definitions of the objects the DVS controller reconciles:
//! distributed switches, distributed port groups, host bindings and
//! VM NIC bindings, plus the YAML declaration file that lists them.

pub mod binding;
pub mod declarations;
pub mod port_group;
pub mod switch;

pub use binding::*;
pub use declarations::*;
pub use port_group::*;
pub use switch::*;
