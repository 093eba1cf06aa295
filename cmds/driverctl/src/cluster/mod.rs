//! Cluster-side commit: propagate the driver type into agent ConfigMaps.
//!
//! The patcher only depends on the [`ClientFactory`] and [`ConfigMapClient`]
//! traits; [`KubeClientFactory`] is the kube-rs backed implementation used by
//! the binary.

pub mod client;
pub mod patcher;

pub use client::{
	ClientFactory, ClusterApiError, ConfigMapClient, ConnectionError, KubeClientFactory,
	KubeConfigMapClient,
};
pub use patcher::{engine_kind_patch, patch_config_maps, ClusterTarget, DISCOVERY_LABEL_SELECTOR};
