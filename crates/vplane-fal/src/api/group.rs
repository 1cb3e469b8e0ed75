//! Classifier group requests.

use vplane_types::{AddressFamily, Direction};

/// Parameters for creating a classifier group (a hardware table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCreate {
    /// Interface the owning ruleset is bound to.
    pub ifname: String,
    pub direction: Direction,
    /// Rule group name.
    pub name: String,
    pub family: AddressFamily,
    /// Union of the summary bits of the group's rules.
    pub summary: u32,
}

impl GroupCreate {
    /// Context string used in FAL log lines.
    pub fn context(&self) -> String {
        format!("{}/{}|{}", self.direction.padded(), self.ifname, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_create_context() {
        let req = GroupCreate {
            ifname: "dp0s3".to_string(),
            direction: Direction::Out,
            name: "acl-b".to_string(),
            family: AddressFamily::V6,
            summary: 0,
        };
        assert_eq!(req.context(), "Out/dp0s3|acl-b");
    }
}
