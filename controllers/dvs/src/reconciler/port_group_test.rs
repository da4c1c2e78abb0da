//! Unit tests for the port group reconciler

#[cfg(test)]
mod tests {
    use crate::error::DvsError;
    use crate::identity::{PortGroupId, SwitchId};
    use crate::reconciler::port_group::build_port_group_config_spec;
    use crate::reconciler::Reconciler;
    use crate::test_utils::*;
    use dvs_resources::{BindingType, OverridePolicy};
    use vsphere_client::{MockVSphereClient, PortgroupType, TaskScript};

    async fn with_switch() -> (MockVSphereClient, Reconciler, SwitchId) {
        let mock = create_test_inventory();
        let reconciler = create_test_reconciler(&mock);
        let switch = reconciler.create_switch(&create_test_switch_spec()).await.unwrap();
        (mock, reconciler, switch)
    }

    #[test]
    fn test_build_config_spec_sends_every_policy_flag() {
        let mut spec = create_test_port_group_spec("pg1");
        spec.policy.traffic_filter_override_allowed = true;
        spec.default_vlan = Some(120);

        let config = build_port_group_config_spec(&spec).unwrap();
        assert_eq!(config.num_ports, 16);
        assert_eq!(config.auto_expand, Some(true));
        assert_eq!(config.binding_type, PortgroupType::EarlyBinding);
        let policy = config.policy.unwrap();
        assert_eq!(policy.network_resource_pool_override_allowed, Some(false));
        assert_eq!(policy.traffic_filter_override_allowed, Some(true));
        assert_eq!(policy.vendor_config_override_allowed, Some(false));
        assert_eq!(config.default_port_config.unwrap().vlan_id(), Some(120));
    }

    #[test]
    fn test_build_config_spec_rejects_bad_vlan() {
        let mut spec = create_test_port_group_spec("pg1");
        spec.default_vlan = Some(4095);
        assert!(matches!(build_port_group_config_spec(&spec), Err(DvsError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (_mock, reconciler, switch) = with_switch().await;

        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        assert_eq!(id.to_string(), "dvpg|dc1|/net/dvs1|pg1");

        let loaded = reconciler.read_port_group(&id).await.unwrap();
        assert_eq!(loaded.spec.policy, OverridePolicy::default());
        assert_eq!(loaded.spec.num_ports, 16);
        assert!(loaded.spec.auto_expand);
        assert_eq!(loaded.spec.binding_type, BindingType::EarlyBinding);
        assert_eq!(loaded.full_path, "/net/dvs1/pg1");
        assert_eq!(loaded.spec, create_test_port_group_spec("pg1"));

        let again = reconciler.load_port_group("dc1", "/net/dvs1", "pg1").await.unwrap();
        assert_eq!(loaded, again);
    }

    #[tokio::test]
    async fn test_ephemeral_with_vlan_reads_back() {
        let (_mock, reconciler, switch) = with_switch().await;
        let mut spec = create_test_port_group_spec("pg-vlan");
        spec.binding_type = BindingType::Ephemeral;
        spec.default_vlan = Some(42);
        spec.description = Some("storage".to_string());

        let id = reconciler.create_port_group(&switch.to_string(), &spec).await.unwrap();
        assert_eq!(reconciler.read_port_group(&id).await.unwrap().spec, spec);
    }

    #[tokio::test]
    async fn test_create_with_malformed_owner() {
        let (mock, reconciler, _switch) = with_switch().await;
        let before = mock.submissions().len();

        let err = reconciler
            .create_port_group("dvs|dc1", &create_test_port_group_spec("pg1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DvsError::MalformedIdentifier { kind: "switch", .. }));
        assert_eq!(mock.submissions().len(), before);
    }

    #[tokio::test]
    async fn test_create_on_missing_switch() {
        let (_mock, reconciler, _switch) = with_switch().await;
        let err = reconciler
            .create_port_group("dvs|dc1|/net/dvs9", &create_test_port_group_spec("pg1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DvsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_override_flags_are_batched() {
        let (mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        let dc = reconciler.resolve_datacenter("dc1").await.unwrap();
        let pg = reconciler.resolve_port_group(&dc, &id).await.unwrap();

        mock.update_portgroup(&pg, |props| {
            if let Some(policy) = props.config.policy.as_mut() {
                policy.network_resource_pool_override_allowed = None;
                policy.traffic_filter_override_allowed = None;
            }
        });

        match reconciler.read_port_group(&id).await {
            Err(DvsError::MissingPolicyField { fields, .. }) => assert_eq!(
                fields,
                vec!["networkResourcePoolOverrideAllowed", "trafficFilterOverrideAllowed"]
            ),
            other => panic!("expected MissingPolicyField, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_late_binding_port_group_is_rejected() {
        let (mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg-legacy"))
            .await
            .unwrap();
        let dc = reconciler.resolve_datacenter("dc1").await.unwrap();
        let pg = reconciler.resolve_port_group(&dc, &id).await.unwrap();
        mock.update_portgroup(&pg, |props| props.config.binding_type = PortgroupType::LateBinding);

        match reconciler.read_port_group(&id).await {
            Err(DvsError::TypeMismatch { path, actual, .. }) => {
                assert_eq!(path, "/net/dvs1/pg-legacy");
                assert_eq!(actual, "lateBinding port group");
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_port_group_key_is_resolved_fresh() {
        let (_mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        let dc = reconciler.resolve_datacenter("dc1").await.unwrap();

        let key = reconciler.port_group_key(&dc, &id).await.unwrap();
        assert!(key.starts_with("dvportgroup-"));

        // recreated behind our back: same identity, new key
        reconciler.delete_port_group(&id).await.unwrap();
        reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        let fresh = reconciler.port_group_key(&dc, &id).await.unwrap();
        assert_ne!(key, fresh);
    }

    #[tokio::test]
    async fn test_delete_port_group() {
        let (mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();

        reconciler.delete_port_group(&id).await.unwrap();
        assert!(mock.submissions().iter().any(|s| s.starts_with("Destroy_Task:dvportgroup-")));
        assert!(matches!(reconciler.read_port_group(&id).await, Err(DvsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_port_group_in_use_fails() {
        let (mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        let dc = reconciler.resolve_datacenter("dc1").await.unwrap();
        let key = reconciler.port_group_key(&dc, &id).await.unwrap();
        create_test_vm(&mock, "web/vm1", Some(("uuid-1", &key)));

        match reconciler.delete_port_group(&id).await {
            Err(DvsError::TaskFailed { cause, .. }) => assert!(cause.contains("ResourceInUse")),
            other => panic!("expected TaskFailed, got {:?}", other),
        }
        assert!(reconciler.read_port_group(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_task_cancelled() {
        let (mock, reconciler, switch) = with_switch().await;
        let id = reconciler
            .create_port_group(&switch.to_string(), &create_test_port_group_spec("pg1"))
            .await
            .unwrap();
        mock.push_task_script(TaskScript::cancelled().after(1));

        assert!(matches!(
            reconciler.delete_port_group(&id).await,
            Err(DvsError::TaskFailed { cancelled: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_port_group_is_unimplemented() {
        let (_mock, reconciler, switch) = with_switch().await;
        let id = PortGroupId::new(switch, "pg1").unwrap();
        assert!(matches!(
            reconciler.update_port_group(&id, &create_test_port_group_spec("pg1")).await,
            Err(DvsError::Unimplemented(_))
        ));
    }
}
