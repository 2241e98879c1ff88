use crate::inventory::Inventory;

const PRODUCT_SELECTOR_TEMPLATE: &str = include_str!("../prompts/product_selector.txt");
const INVENTORY_PLACEHOLDER: &str = "{{inventory}}";

/// Renders the system instruction for a catalog. Titles are emitted as a
/// sorted JSON array so identical inventories always yield identical prompts.
pub fn build_system_prompt(inventory: &Inventory) -> String {
    let titles = inventory.titles();
    let inventory_json = serde_json::to_string(&titles).unwrap_or_else(|_| "[]".to_string());
    PRODUCT_SELECTOR_TEMPLATE.replace(INVENTORY_PLACEHOLDER, &inventory_json)
}
