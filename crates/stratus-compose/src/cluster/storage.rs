//! Cloud-specific storage classes.
//!
//! AWS only needs the EBS `gp2` class. GCP gets `pd-ssd` plus the
//! `local-scsi` class backed by a local-volume-provisioner DaemonSet that
//! turns the nodes' local SSDs under `/mnt/disks` into PersistentVolumes.

use serde_json::json;
use stratus_core::CloudTarget;
use stratus_state::ResourceKind;

use crate::collection::{Resource, ResourceCollection};
use crate::images;

const PROVISIONER: &str = "local-volume-provisioner";
const PROVISIONER_NAMESPACE: &str = "default";
const LOCAL_DISKS: &str = "/mnt/disks";

pub fn storage_resources(target: CloudTarget) -> ResourceCollection {
    match target {
        CloudTarget::Aws => aws(),
        CloudTarget::Gcp => gcp(),
    }
}

fn aws() -> ResourceCollection {
    let mut collection = ResourceCollection::new();
    collection.add(Resource::new(
        ResourceKind::StorageClass,
        json!({
            "metadata": {"name": CloudTarget::Aws.storage_class()},
            "provisioner": "kubernetes.io/aws-ebs",
            "parameters": {"type": "gp2", "fsType": "ext4"},
            "volumeBindingMode": "WaitForFirstConsumer",
        }),
    ));
    collection
}

fn gcp() -> ResourceCollection {
    let service_account = format!("{PROVISIONER}-sa");
    let node_role = format!("{PROVISIONER}-node-clusterrole");
    let mut collection = ResourceCollection::new();

    collection.add(Resource::new(
        ResourceKind::StorageClass,
        json!({
            "metadata": {"name": "local-scsi"},
            "provisioner": "kubernetes.io/no-provisioner",
            "volumeBindingMode": "WaitForFirstConsumer",
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::StorageClass,
        json!({
            "metadata": {"name": CloudTarget::Gcp.storage_class()},
            "provisioner": "kubernetes.io/gce-pd",
            "parameters": {"type": "pd-ssd"},
            "volumeBindingMode": "WaitForFirstConsumer",
        }),
    ));

    collection.add(Resource::new(
        ResourceKind::ConfigMap,
        json!({
            "metadata": {"name": PROVISIONER, "namespace": PROVISIONER_NAMESPACE},
            "data": {
                "useNodeNameOnly": "true",
                "storageClassMap": format!(
                    "local-scsi:\n   hostDir: {LOCAL_DISKS}\n   mountDir:  {LOCAL_DISKS}\n"
                ),
            },
        }),
    ));
    collection.add(Resource::new(
        ResourceKind::ServiceAccount,
        json!({"metadata": {"name": service_account, "namespace": PROVISIONER_NAMESPACE}}),
    ));
    collection.add(Resource::new(
        ResourceKind::ClusterRole,
        json!({
            "metadata": {"name": node_role},
            "rules": [{"apiGroups": [""], "resources": ["nodes"], "verbs": ["get"]}],
        }),
    ));

    for (binding, role) in [
        ("pv-binding", "system:persistent-volume-provisioner"),
        ("node-binding", node_role.as_str()),
    ] {
        collection.add(Resource::new(
            ResourceKind::ClusterRoleBinding,
            json!({
                "metadata": {"name": format!("{PROVISIONER}-{binding}")},
                "subjects": [{
                    "kind": "ServiceAccount",
                    "name": service_account,
                    "namespace": PROVISIONER_NAMESPACE,
                }],
                "roleRef": {
                    "kind": "ClusterRole",
                    "name": role,
                    "apiGroup": "rbac.authorization.k8s.io",
                },
            }),
        ));
    }

    collection.add(Resource::new(
        ResourceKind::DaemonSet,
        json!({
            "metadata": {
                "name": PROVISIONER,
                "namespace": PROVISIONER_NAMESPACE,
                "labels": {"app": PROVISIONER},
            },
            "spec": {
                "selector": {"matchLabels": {"app": PROVISIONER}},
                "template": {
                    "metadata": {"labels": {"app": PROVISIONER}},
                    "spec": {
                        "serviceAccountName": service_account,
                        "containers": [{
                            "name": "provisioner",
                            "image": images::LOCAL_VOLUME_PROVISIONER,
                            "imagePullPolicy": "Always",
                            "securityContext": {"privileged": true},
                            "env": [{
                                "name": "MY_NODE_NAME",
                                "valueFrom": {"fieldRef": {"fieldPath": "spec.nodeName"}},
                            }],
                            "volumeMounts": [
                                {"mountPath": "/etc/provisioner/config", "name": "provisioner-config", "readOnly": true},
                                {"mountPath": LOCAL_DISKS, "name": "local-scsi"},
                            ],
                        }],
                        "volumes": [
                            {"name": "provisioner-config", "configMap": {"name": PROVISIONER}},
                            {"name": "local-scsi", "hostPath": {"path": LOCAL_DISKS}},
                        ],
                    },
                },
            },
        }),
    ));

    collection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_gets_only_gp2() {
        let c = storage_resources(CloudTarget::Aws);
        assert_eq!(c.len(), 1);
        assert!(c.contains(ResourceKind::StorageClass, None, "gp2"));
    }

    #[test]
    fn gcp_gets_ssd_classes_and_provisioner() {
        let c = storage_resources(CloudTarget::Gcp);
        assert!(c.contains(ResourceKind::StorageClass, None, "pd-ssd"));
        assert!(c.contains(ResourceKind::StorageClass, None, "local-scsi"));
        assert!(c.contains(ResourceKind::DaemonSet, Some("default"), PROVISIONER));
        assert!(c.contains(ResourceKind::ServiceAccount, Some("default"), "local-volume-provisioner-sa"));
        assert!(c.contains(ResourceKind::ClusterRole, None, "local-volume-provisioner-node-clusterrole"));
        assert!(c.contains(ResourceKind::ClusterRoleBinding, None, "local-volume-provisioner-pv-binding"));
        assert!(c.contains(ResourceKind::ClusterRoleBinding, None, "local-volume-provisioner-node-binding"));
    }
}
