use strata_domain::{ClusterId, ClusterInstallationState, ClusterState, GroupId, InstallationState, PageRequest};

#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    pub page: PageRequest,
    pub state: Option<ClusterState>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InstallationFilter {
    pub page: PageRequest,
    pub state: Option<InstallationState>,
    pub owner_id: Option<String>,
    pub dns: Option<String>,
    pub group_id: Option<GroupId>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterInstallationFilter {
    pub page: PageRequest,
    pub state: Option<ClusterInstallationState>,
    pub cluster_id: Option<ClusterId>,
    pub installation_id: Option<strata_domain::InstallationId>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    pub page: PageRequest,
}

#[derive(Debug, Clone, Default)]
pub struct EventsFilter {
    pub page: PageRequest,
    pub subject_id: Option<String>,
    pub event_type: Option<String>,
    pub after_sequence: Option<u64>,
}
