/// Formation used when no real team is specified (a "new squad" build).
pub const DEFAULT_FORMATION: [&str; 11] = [
    "GK", "LB", "LCB", "RCB", "RB", "LCM", "CM", "RCM", "CAM", "LS", "RS",
];

pub const SQUAD_SIZE: usize = 11;

/// Collapse lateral slot variants to the role tag candidates are listed under.
///
/// Team sheets label mirrored slots separately (LCB/RCB, LS/RS, ...) while the
/// catalog tags players with the central role only. The mapping is a fixed
/// enumeration; anything outside it is already a catalog role.
pub fn canonical_role(slot_label: &str) -> &str {
    match slot_label {
        "LCB" | "RCB" => "CB",
        "LCM" | "RCM" => "CM",
        "LS" | "RS" => "ST",
        "LDM" | "RDM" => "DM",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lateral_pairs_collapse() {
        assert_eq!(canonical_role("LCB"), "CB");
        assert_eq!(canonical_role("RCB"), "CB");
        assert_eq!(canonical_role("LCM"), "CM");
        assert_eq!(canonical_role("RCM"), "CM");
        assert_eq!(canonical_role("LS"), "ST");
        assert_eq!(canonical_role("RS"), "ST");
        assert_eq!(canonical_role("LDM"), "DM");
        assert_eq!(canonical_role("RDM"), "DM");
    }

    #[test]
    fn plain_roles_pass_through() {
        for role in ["GK", "LB", "RB", "CM", "CAM", "ST", "CDM", "LW"] {
            assert_eq!(canonical_role(role), role);
        }
    }

    #[test]
    fn default_formation_is_a_full_lineup() {
        assert_eq!(DEFAULT_FORMATION.len(), SQUAD_SIZE);
        assert_eq!(DEFAULT_FORMATION[0], "GK");
    }
}
