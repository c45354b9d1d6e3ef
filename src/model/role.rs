#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin,
    Dosen,
    Mahasiswa,
}

impl Role {
    /// Admin wins over lecturer when both flags are set.
    pub fn from_flags(is_admin: bool, is_dosen: bool) -> Self {
        match (is_admin, is_dosen) {
            (true, _) => Role::Admin,
            (false, true) => Role::Dosen,
            (false, false) => Role::Mahasiswa,
        }
    }

    /// Attendance is only tracked for students
    pub fn tracks_attendance(&self) -> bool {
        *self == Role::Mahasiswa
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flag_takes_precedence() {
        assert_eq!(Role::from_flags(true, true), Role::Admin);
        assert_eq!(Role::from_flags(false, true), Role::Dosen);
        assert_eq!(Role::from_flags(false, false), Role::Mahasiswa);
    }

    #[test]
    fn only_students_track_attendance() {
        assert!(Role::Mahasiswa.tracks_attendance());
        assert!(!Role::Admin.tracks_attendance());
        assert!(!Role::Dosen.tracks_attendance());
    }
}
