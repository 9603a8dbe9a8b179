#![allow(dead_code)]

pub mod idp;

pub mod tracing {
    use tracing_subscriber::EnvFilter;

    pub fn init_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("oidc_pkce_client=trace")),
            )
            .with_test_writer()
            .try_init();
    }
}
