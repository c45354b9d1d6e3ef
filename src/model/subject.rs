use super::role::Role;

/// A person resolved from a scanner fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// NIM; accounts without a student record have none
    pub subject_id: Option<String>,
    pub name: Option<String>,
    pub class: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn eligible(&self) -> bool {
        self.role.tracks_attendance()
    }
}
