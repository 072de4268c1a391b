use super::{IdentityRule, ProviderRules, RegionSource, ResourceRule};

const LOCATION: &[RegionSource] = &[RegionSource::Field("location")];

/// Every azurerm resource carries its ARM resource ID in `id`.
const fn arm(resource_type: &'static str, region: &'static [RegionSource]) -> ResourceRule {
    ResourceRule {
        resource_type,
        identity: IdentityRule::Field("id"),
        region,
    }
}

const RULES: &[ResourceRule] = &[
    arm("azurerm_resource_group", LOCATION),
    arm("azurerm_virtual_network", LOCATION),
    arm("azurerm_subnet", &[]),
    arm("azurerm_network_security_group", LOCATION),
    arm("azurerm_network_interface", LOCATION),
    arm("azurerm_public_ip", LOCATION),
    arm("azurerm_storage_account", LOCATION),
    arm("azurerm_linux_virtual_machine", LOCATION),
    arm("azurerm_windows_virtual_machine", LOCATION),
    arm("azurerm_key_vault", LOCATION),
    arm("azurerm_kubernetes_cluster", LOCATION),
];

pub struct AzureProvider;

impl ProviderRules for AzureProvider {
    fn name(&self) -> &str {
        "azurerm"
    }

    fn rules(&self) -> &'static [ResourceRule] {
        RULES
    }

    // ARM resource IDs are case-insensitive and scanners differ in casing
    fn normalize_identity(&self, identity: String) -> String {
        identity.to_ascii_lowercase()
    }
}
