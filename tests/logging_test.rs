#[test]
fn init_installs_the_subscriber_once() {
    assert!(mgmt_auth::logging::init().is_ok());
    tracing::info!("subscriber installed");
    assert!(mgmt_auth::logging::init().is_err());
}
