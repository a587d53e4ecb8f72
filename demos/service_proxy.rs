//! Typed service over the shared registry.
//!
//! ```text
//! cargo run --example service_proxy -- https://httpbin.org/
//! ```
//!
//! Every exchange is printed as one transcript record through `tracing`.

use profile_http::{ClientProfile, ClientRegistry, FormBody, HttpClient, Result, ServiceDescriptor};
use serde_json::Value;

struct EchoApi(HttpClient);

impl ServiceDescriptor for EchoApi {
    fn bind(client: HttpClient) -> Self {
        EchoApi(client)
    }
}

impl EchoApi {
    async fn post(&self, user: &str) -> Result<Value> {
        let mut form = FormBody::new();
        form.add("user", user);
        self.0.post_form("post", form).await?.error_for_status()?.json()
    }

    async fn headers(&self) -> Result<Value> {
        self.0.get_json("headers").await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let base_url = std::env::args().nth(1).unwrap_or_else(|| "https://httpbin.org/".to_string());
    let registry = ClientRegistry::global();

    registry.set_default_configuration(
        ClientProfile::new(&base_url)
            .with_default_header("X-Demo", "service_proxy")
            .with_default_param("lang", "en"),
    );
    let api: EchoApi = registry.create_service()?;
    let echoed = api.post("alice").await?;
    println!("form seen by server: {}", echoed["form"]);

    // One-shot profile that keeps GET as GET.
    registry.set_temporary_configuration(ClientProfile::new(&base_url).with_keep_request_method(true));
    let api: EchoApi = registry.create_service()?;
    let headers = api.headers().await?;
    println!("headers seen by server: {}", headers["headers"]);

    println!("clients built: {}", registry.build_count());
    Ok(())
}
