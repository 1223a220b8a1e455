// Client creation with custom user-agent support for kube 2.x
use crate::error::Result;
use hyper::http::{HeaderName, HeaderValue};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::{debug, info, warn};

/// Create a new k8s client to interact with k8s cluster api
///
/// With no `kubeconfig` path the configuration is inferred the usual way
/// (`KUBECONFIG`, `~/.kube/config`, then in-cluster service account).
///
/// # Errors
///
/// Will return `Err` if no usable configuration can be loaded or the client
/// can not be constructed from it
pub async fn new(custom_user_agent: Option<&str>, kubeconfig: Option<&Path>) -> Result<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            info!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => {
            debug!("Inferring Kubernetes configuration");
            Config::infer().await?
        }
    };

    add_user_agent_header(&mut config, custom_user_agent);

    let client = Client::try_from(config)?;

    Ok(client)
}

/// Attach `user_agent` to every request made with `config`.
///
/// An invalid header value is logged and skipped so the default user-agent
/// is used instead.
pub fn add_user_agent_header(config: &mut Config, user_agent: Option<&str>) {
    let Some(user_agent) = user_agent else {
        return;
    };

    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        }
        Err(e) => {
            warn!("Ignoring invalid user-agent {:?}: {}", user_agent, e);
        }
    }
}
