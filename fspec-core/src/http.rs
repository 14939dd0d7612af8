//! Blocking HTTP adapter for the control plane.
//!
//! One REST route per resource kind under `{server}/v2/`. The apply engine
//! is strictly sequential, so a blocking client keeps the call sites simple.
//! No retries: failures surface immediately and the operator re-runs apply.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::error::{io_err, ClientError};
use crate::types::{
    Archive, Environment, Function, HttpTrigger, KubernetesWatchTrigger, Metadata,
    MessageQueueTrigger, Package, TimeTrigger,
};
use crate::{Cluster, ResourceClient};

/// Control-plane client speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClient {
    server: String,
    http: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(server: impl Into<String>) -> Result<Self, ClientError> {
        let server = server.into();
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/v2/{route}", self.server)
    }

    fn check(
        op: String,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::Status {
                op,
                status: status.as_u16(),
            })
        }
    }
}

macro_rules! http_client {
    ($resource:ty, $route:literal) => {
        impl ResourceClient<$resource> for HttpClient {
            fn list(&self) -> Result<Vec<$resource>, ClientError> {
                let response = self.http.get(self.url($route)).send()?;
                Ok(Self::check(format!("list {}", $route), response)?.json()?)
            }

            fn create(&self, resource: &$resource) -> Result<Metadata, ClientError> {
                let response = self.http.post(self.url($route)).json(resource).send()?;
                let op = format!("create {} {}", $route, resource.metadata);
                Ok(Self::check(op, response)?.json()?)
            }

            fn update(&self, resource: &$resource) -> Result<Metadata, ClientError> {
                let route = format!(
                    "{}/{}/{}",
                    $route, resource.metadata.namespace, resource.metadata.name
                );
                let response = self.http.put(self.url(&route)).json(resource).send()?;
                let op = format!("update {} {}", $route, resource.metadata);
                Ok(Self::check(op, response)?.json()?)
            }

            fn delete(&self, metadata: &Metadata) -> Result<(), ClientError> {
                let route = format!("{}/{}/{}", $route, metadata.namespace, metadata.name);
                let response = self.http.delete(self.url(&route)).send()?;
                Self::check(format!("delete {} {}", $route, metadata), response)?;
                Ok(())
            }
        }
    };
}

http_client!(Environment, "environments");
http_client!(Package, "packages");
http_client!(Function, "functions");
http_client!(HttpTrigger, "triggers/http");
http_client!(KubernetesWatchTrigger, "watches");
http_client!(TimeTrigger, "triggers/time");
http_client!(MessageQueueTrigger, "triggers/messagequeue");

impl Cluster for HttpClient {
    fn upload_archive(&self, path: &Path) -> Result<Archive, ClientError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        let response = self.http.post(self.url("archives")).body(file).send()?;
        let op = format!("upload archive {}", path.display());
        Ok(Self::check(op, response)?.json()?)
    }
}
