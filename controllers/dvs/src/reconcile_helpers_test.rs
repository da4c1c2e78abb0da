//! Unit tests for reconcile_helpers module

#[cfg(test)]
mod tests {
    use crate::error::DvsError;
    use crate::reconcile_helpers::*;
    use vsphere_client::VSphereError;

    #[test]
    fn test_flag_reader_all_present() {
        let mut reader = FlagReader::new("switch dvs1");
        assert!(reader.read("autoPreInstallAllowed", Some(true)));
        assert!(!reader.read("autoUpgradeAllowed", Some(false)));
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_flag_reader_reports_every_missing_field() {
        let mut reader = FlagReader::new("port group pg1");
        reader.read("blockOverrideAllowed", None);
        reader.read("livePortMovingAllowed", Some(true));
        reader.read("shapingOverrideAllowed", None);

        match reader.finish() {
            Err(DvsError::MissingPolicyField { object, fields }) => {
                assert_eq!(object, "port group pg1");
                assert_eq!(fields, vec!["blockOverrideAllowed", "shapingOverrideAllowed"]);
            }
            other => panic!("expected MissingPolicyField, got {:?}", other),
        }
    }

    #[test]
    fn test_flag_reader_absent_policy() {
        let mut reader = FlagReader::new("switch dvs1");
        reader.all_missing(&["a", "b"]);
        assert!(matches!(
            reader.finish(),
            Err(DvsError::MissingPolicyField { fields, .. }) if fields.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_check_existing_found() {
        let result = check_existing("switch dvs1", async { Ok::<_, DvsError>(7) }).await;
        assert_eq!(result.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_check_existing_drift() {
        let result = check_existing("switch dvs1", async {
            Err::<u32, _>(DvsError::NotFound("dc1/network/dvs1".to_string()))
        })
        .await;
        assert_eq!(result.unwrap(), None);

        let result = check_existing("binding", async {
            Err::<u32, _>(DvsError::BindingNotFound("esxi1".to_string()))
        })
        .await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_check_existing_transport_error_is_not_drift() {
        let result = check_existing("switch dvs1", async {
            Err::<u32, _>(DvsError::Transport(VSphereError::Connection("reset".to_string())))
        })
        .await;
        assert!(matches!(result, Err(DvsError::Transport(_))));
    }

    #[test]
    fn test_ignore_gone() {
        assert!(ignore_gone("pg1", Err(DvsError::NotFound("pg1".to_string()))).is_ok());
        assert!(ignore_gone("pg1", Err(DvsError::Unimplemented("x".to_string()))).is_err());
        assert!(ignore_gone("pg1", Ok(())).is_ok());
    }
}
