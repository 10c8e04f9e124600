//! Maintenance of the well-known Safe contract rows.
//!
//! The canonical deployments ship with the service as a
//! `version → {contract name → addresses}` map; matching rows get their
//! name, display name and delegate-call trust refreshed on startup and
//! hourly.

use std::collections::{BTreeMap, HashSet};

use decoder_core::utils::parse_address;
use sqlx::PgPool;
use tracing::{info, warn};

use decoder_db::Contract;

const SAFE_DEPLOYMENTS: &str = include_str!("../../assets/safe_deployments.json");

type DeploymentsByVersion = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `(version, contract_name, address)` triples of every known deployment.
pub fn default_deployments() -> Vec<(String, String, String)> {
    let deployments: DeploymentsByVersion =
        serde_json::from_str(SAFE_DEPLOYMENTS).expect("embedded deployments are valid JSON");
    let mut flattened = Vec::new();
    for (version, contracts) in deployments {
        for (contract_name, addresses) in contracts {
            for address in addresses {
                flattened.push((version.clone(), contract_name.clone(), address));
            }
        }
    }
    flattened
}

/// Display name rule: drop the `Gnosis` brand, make sure `Safe` appears and
/// append the version.
pub fn display_name(contract_name: &str, version: &str) -> String {
    let contract_name = contract_name.replace("Gnosis", "");
    if contract_name.to_lowercase().contains("safe") {
        format!("{contract_name} {version}")
    } else {
        format!("Safe: {contract_name} {version}")
    }
}

/// Refresh every known deployment's rows across all chains. Addresses the
/// service never saw yet are skipped with a warning.
pub async fn update_safe_contracts_info(
    pool: &PgPool,
    trusted_for_delegate_call: &HashSet<String>,
) -> sqlx::Result<u64> {
    let mut total_affected = 0;
    for (version, contract_name, address) in default_deployments() {
        let Some(parsed) = parse_address(&address) else {
            warn!(target: "safe_contracts", %address, "invalid deployment address");
            continue;
        };
        let affected = Contract::update_info(
            pool,
            parsed.as_bytes(),
            &contract_name,
            &display_name(&contract_name, &version),
            trusted_for_delegate_call.contains(&contract_name),
        )
        .await?;
        if affected > 0 {
            info!(
                target: "safe_contracts",
                %address,
                chains = affected,
                "updated contract info"
            );
        } else {
            warn!(target: "safe_contracts", %address, "no contract row for deployment");
        }
        total_affected += affected;
    }
    Ok(total_affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prepends_safe_when_missing() {
        assert_eq!(display_name("MultiSend", "1.3.0"), "Safe: MultiSend 1.3.0");
        assert_eq!(display_name("CreateCall", "1.4.1"), "Safe: CreateCall 1.4.1");
    }

    #[test]
    fn display_name_strips_gnosis() {
        assert_eq!(display_name("GnosisSafe", "1.3.0"), "Safe 1.3.0");
        assert_eq!(display_name("GnosisSafeProxyFactory", "1.3.0"), "SafeProxyFactory 1.3.0");
    }

    #[test]
    fn display_name_keeps_existing_safe() {
        assert_eq!(display_name("SafeL2", "1.4.1"), "SafeL2 1.4.1");
        assert_eq!(display_name("SafeMigration", "1.4.1"), "SafeMigration 1.4.1");
    }

    #[test]
    fn deployments_flatten_to_triples() {
        let deployments = default_deployments();
        assert!(deployments.len() >= 20);
        assert!(deployments.iter().all(|(_, _, address)| parse_address(address).is_some()));
        assert!(deployments.iter().any(|(version, name, _)| {
            version == "1.3.0" && name == "MultiSendCallOnly"
        }));
    }
}
