use std::collections::HashMap;
use std::sync::OnceLock;

use crate::workflows::equipment::domain::EquipmentType;

static TYPE_ALIASES: OnceLock<HashMap<String, EquipmentType>> = OnceLock::new();

pub(crate) fn normalize_label(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Resolves an inventory type label, in English or Malay, to an equipment type.
pub(crate) fn equipment_type_for(label: &str) -> Option<EquipmentType> {
    type_aliases().get(&normalize_label(label)).copied()
}

fn type_aliases() -> &'static HashMap<String, EquipmentType> {
    TYPE_ALIASES.get_or_init(|| {
        const ALIASES: &[(&str, EquipmentType)] = &[
            ("laptop", EquipmentType::Laptop),
            ("notebook", EquipmentType::Laptop),
            ("komputer riba", EquipmentType::Laptop),
            ("desktop", EquipmentType::Desktop),
            ("desktop computer", EquipmentType::Desktop),
            ("pc", EquipmentType::Desktop),
            ("komputer meja", EquipmentType::Desktop),
            ("projector", EquipmentType::Projector),
            ("lcd projector", EquipmentType::Projector),
            ("projektor", EquipmentType::Projector),
            ("printer", EquipmentType::Printer),
            ("pencetak", EquipmentType::Printer),
            ("tablet", EquipmentType::Tablet),
            ("tablet pc", EquipmentType::Tablet),
            ("monitor", EquipmentType::Monitor),
            ("skrin", EquipmentType::Monitor),
            ("network device", EquipmentType::NetworkDevice),
            ("network_device", EquipmentType::NetworkDevice),
            ("router", EquipmentType::NetworkDevice),
            ("switch", EquipmentType::NetworkDevice),
            ("peranti rangkaian", EquipmentType::NetworkDevice),
            ("other", EquipmentType::Other),
            ("lain-lain", EquipmentType::Other),
        ];

        ALIASES
            .iter()
            .map(|(label, kind)| (normalize_label(label), *kind))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_trimmed_collapsed_and_lowercased() {
        assert_eq!(normalize_label("\u{feff}  Komputer   RIBA "), "komputer riba");
    }

    #[test]
    fn malay_and_english_aliases_resolve() {
        assert_eq!(equipment_type_for("Komputer Riba"), Some(EquipmentType::Laptop));
        assert_eq!(equipment_type_for("LCD  Projector"), Some(EquipmentType::Projector));
        assert_eq!(equipment_type_for("Pencetak"), Some(EquipmentType::Printer));
        assert_eq!(equipment_type_for("hoverboard"), None);
    }
}
