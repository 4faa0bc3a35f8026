//! 虚拟机目录解析测试

mod common;

use std::sync::Arc;

use common::{vm_resource, MockSession, SUBSCRIPTION};
use vmops_azure::{AzureError, OsType, PowerState};
use vmops_executor::*;

const SYSTEM_TAG: (&str, &str) = ("System", "CENTRAL_LOYALTY_PROMOTIONS_ENGINE");

fn system_filter() -> VmFilter {
    VmFilter::new().tag(TagFilter::new(SYSTEM_TAG.0, SYSTEM_TAG.1))
}

#[tokio::test]
async fn test_tag_filter_selects_only_matching_vm() {
    let session = MockSession::new(vec![
        vm_resource("A", "RG-CLPE", &[SYSTEM_TAG], "Windows"),
        vm_resource("B", "RG-OTHER", &[("System", "OTHER")], "Windows"),
    ]);

    let vms = DirectoryResolver::new(Arc::new(session))
        .resolve(&system_filter())
        .await
        .unwrap();

    assert_eq!(vms.len(), 1);
    assert_eq!(vms[0].name, "A");
    assert_eq!(vms[0].resource_group, "RG-CLPE");
    assert_eq!(vms[0].subscription_id, SUBSCRIPTION);
    assert_eq!(vms[0].os_type, OsType::Windows);
    assert_eq!(vms[0].power_state, PowerState::Running);
    assert_eq!(vms[0].vm_size.as_deref(), Some("Standard_D4s_v3"));
}

#[tokio::test]
async fn test_duplicate_names_first_wins() {
    let session = MockSession::new(vec![
        vm_resource("CLPEWEB01", "RG-FIRST", &[SYSTEM_TAG], "Windows"),
        vm_resource("clpeweb01", "RG-SECOND", &[SYSTEM_TAG], "Windows"),
        vm_resource("CLPEDB01", "RG-FIRST", &[SYSTEM_TAG], "Windows"),
    ]);

    let vms = DirectoryResolver::new(Arc::new(session))
        .resolve(&system_filter())
        .await
        .unwrap();

    let names: Vec<_> = vms.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["CLPEWEB01", "CLPEDB01"]);
    assert_eq!(vms[0].resource_group, "RG-FIRST");
}

#[tokio::test]
async fn test_empty_directory_is_not_an_error() {
    let vms = DirectoryResolver::new(Arc::new(MockSession::new(Vec::new())))
        .resolve(&system_filter())
        .await
        .unwrap();
    assert!(vms.is_empty());
}

#[tokio::test]
async fn test_listing_failures_are_classified() {
    let auth = DirectoryResolver::new(Arc::new(MockSession::failing_list(|| {
        AzureError::AuthError("token expired".to_string())
    })))
    .resolve(&VmFilter::new())
    .await
    .unwrap_err();
    assert!(matches!(auth, ExecutorError::Auth(_)));
    assert_eq!(auth.kind(), Some(ErrorKind::Auth));

    let listing = DirectoryResolver::new(Arc::new(MockSession::failing_list(|| {
        AzureError::ApiError(500, "InternalServerError".to_string())
    })))
    .resolve(&VmFilter::new())
    .await
    .unwrap_err();
    assert!(matches!(listing, ExecutorError::DirectoryResolution(_)));
    assert!(listing.kind().map_or(false, |k| k.is_fatal()));
}

#[tokio::test]
async fn test_power_state_failure_records_unknown() {
    let session = MockSession::new(vec![
        vm_resource("CLPEWEB01", "RG", &[SYSTEM_TAG], "Windows"),
        vm_resource("CLPEWEB02", "RG", &[SYSTEM_TAG], "Windows"),
    ])
    .with_power_error("CLPEWEB02");

    let vms = DirectoryResolver::new(Arc::new(session))
        .resolve(&system_filter())
        .await
        .unwrap();

    assert_eq!(vms[0].power_state, PowerState::Running);
    assert_eq!(vms[1].power_state, PowerState::Unknown);
}

#[tokio::test]
async fn test_without_power_state_and_os_filter() {
    let session = MockSession::new(vec![
        vm_resource("CLPEWEB01", "RG", &[SYSTEM_TAG, ("Name", "clpe-web-01")], "Windows"),
        vm_resource("CLPEWEB02", "RG", &[SYSTEM_TAG, ("Name", "clpe-web-02")], "Linux"),
        vm_resource("CLPEDB01", "RG", &[SYSTEM_TAG, ("Name", "clpe-db-01")], "Windows"),
    ]);

    let filter = system_filter().name_tag_contains("web").os_type(OsType::Windows);
    let vms = DirectoryResolver::new(Arc::new(session))
        .without_power_state()
        .resolve(&filter)
        .await
        .unwrap();

    assert_eq!(vms.len(), 1);
    assert_eq!(vms[0].name, "CLPEWEB01");
    assert_eq!(vms[0].power_state, PowerState::Unknown);
}
