use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar as K8sEnvVar, LocalObjectReference, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{DeleteParams, ObjectMeta, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, ResourceExt};
use uuid::Uuid;
use warden_types::WorkloadTemplate;

use crate::naming;
use crate::util::{Error, MANAGER_NAME};

/// Container port the workload exposes, and the name the service forwards it under.
pub const GAME_PORT: i32 = 7777;
pub const GAME_PORT_NAME: &str = "unreal";

/// Label carried by every workload/service this controller creates, used both as the pod
/// selector and to reverse-map cluster objects back to record identifiers (§9's remnant scan).
pub const MANAGED_BY_LABEL: &str = "managed-by";

fn labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), name.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGER_NAME.to_string()),
    ])
}

/// Thin wrapper over a [`kube::Client`] exposing exactly the CRUD surface the event handler
/// and reconciler need: the watched document, the single-replica workload, and its node-port
/// service.
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
    namespace: String,
    document_resource: ApiResource,
}

impl ClusterClient {
    pub fn new(client: Client, namespace: String, gvk: GroupVersionKind, plural: &str) -> Self {
        let document_resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        ClusterClient {
            client,
            namespace,
            document_resource,
        }
    }

    fn documents(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &self.document_resource)
    }

    fn workloads(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    pub async fn delete_document(&self, name: &str) -> Result<(), Error> {
        delete_ignoring_not_found(self.documents().delete(name, &DeleteParams::default()).await)
    }

    pub async fn get_workload(&self, name: &str) -> Result<Option<Deployment>, Error> {
        get_opt(self.workloads().get(name).await)
    }

    pub async fn delete_workload(&self, name: &str) -> Result<(), Error> {
        delete_ignoring_not_found(self.workloads().delete(name, &DeleteParams::default()).await)
    }

    pub async fn get_service(&self, name: &str) -> Result<Option<Service>, Error> {
        get_opt(self.services().get(name).await)
    }

    pub async fn delete_service(&self, name: &str) -> Result<(), Error> {
        delete_ignoring_not_found(self.services().delete(name, &DeleteParams::default()).await)
    }

    /// Creates the workload described by `template`. An "already exists" response is treated
    /// as success (§7: the watcher and the reconciler may race to create the same workload).
    pub async fn create_workload(&self, template: &WorkloadTemplate) -> Result<(), Error> {
        let name = naming::name(template.id);
        let deployment = build_deployment(&name, &self.namespace, template);
        match self
            .workloads()
            .create(&PostParams::default(), &deployment)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if Error::from(e).is_already_exists() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the service for `id` and returns its cluster-assigned node-port. Uses only the
    /// identifier, matching §4.4's self-healing path that does not require a document re-read.
    pub async fn create_service(&self, id: Uuid) -> Result<i32, Error> {
        let name = naming::name(id);
        let service = build_service(&name, &self.namespace);
        let created = match self
            .services()
            .create(&PostParams::default(), &service)
            .await
        {
            Ok(svc) => svc,
            Err(e) if Error::from(e).is_already_exists() => self
                .services()
                .get(&name)
                .await
                .map_err(Error::from)?,
            Err(e) => return Err(e.into()),
        };
        node_port(&created).ok_or_else(|| {
            Error::malformed(format!("service/{name}"), "no node-port was assigned")
        })
    }

    /// Lists the names of every workload and service this controller manages in its
    /// namespace, for the reconciler's remnant scan (§9). Bounded by the controller's own
    /// label selector, so cost tracks this controller's resource count, not the cluster's.
    pub async fn list_managed_names(&self) -> Result<Vec<String>, Error> {
        let selector = format!("{MANAGED_BY_LABEL}={MANAGER_NAME}");
        let params = kube::api::ListParams::default().labels(&selector);
        let mut names = Vec::new();
        for d in self.workloads().list(&params).await? {
            names.push(d.name_any());
        }
        for s in self.services().list(&params).await? {
            names.push(s.name_any());
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

fn get_opt<T>(result: Result<T, kube::Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            let e = Error::from(e);
            if e.is_not_found() { Ok(None) } else { Err(e) }
        }
    }
}

fn delete_ignoring_not_found<T>(result: Result<T, kube::Error>) -> Result<(), Error> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let e = Error::from(e);
            if e.is_not_found() { Ok(()) } else { Err(e) }
        }
    }
}

fn node_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .iter()
        .find(|p| p.name.as_deref() == Some(GAME_PORT_NAME))?
        .node_port
}

fn build_deployment(name: &str, namespace: &str, template: &WorkloadTemplate) -> Deployment {
    let env: Vec<K8sEnvVar> = template
        .env
        .iter()
        .map(|e| K8sEnvVar {
            name: e.name.clone(),
            value: Some(e.value.clone()),
            ..Default::default()
        })
        .collect();
    let image_pull_secrets: Vec<LocalObjectReference> = template
        .image_pull_secrets
        .iter()
        .map(|s| LocalObjectReference { name: s.clone() })
        .collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(name)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels(name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "server".to_string(),
                        image: Some(template.image.clone()),
                        env: Some(env),
                        ports: Some(vec![ContainerPort {
                            name: Some(GAME_PORT_NAME.to_string()),
                            container_port: GAME_PORT,
                            protocol: Some("UDP".to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    image_pull_secrets: if image_pull_secrets.is_empty() {
                        None
                    } else {
                        Some(image_pull_secrets)
                    },
                    restart_policy: Some("Always".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn build_service(name: &str, namespace: &str) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("NodePort".to_string()),
            selector: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
            ports: Some(vec![ServicePort {
                name: Some(GAME_PORT_NAME.to_string()),
                port: GAME_PORT,
                protocol: Some("UDP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}
