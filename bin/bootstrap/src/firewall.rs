use brinx_client::entities::{
  config::FirewallRule, error::BootstrapError, update::Log,
};

use crate::host::HostEnvironment;

/// Allows each rule not already allowed, then enables the
/// firewall if it is inactive. Rules go in before enabling so
/// ssh stays reachable.
#[instrument("EnsureFirewall", skip(host, logs))]
pub async fn ensure_rules<H: HostEnvironment>(
  host: &H,
  rules: &[FirewallRule],
  logs: &mut Vec<Log>,
) -> Result<(), BootstrapError> {
  let status = host
    .firewall_status()
    .await
    .map_err(BootstrapError::firewall)?;

  for rule in rules {
    if status.rules.contains(rule) {
      logs.push(Log::simple(
        "Firewall Rule",
        format!("{rule} already allowed"),
      ));
      continue;
    }
    let log = host.allow_firewall_rule(*rule).await;
    let success = log.success;
    let reason = log.failure_reason();
    logs.push(log);
    if !success {
      return Err(BootstrapError::FirewallError(format!(
        "Failed to allow {rule} | {reason}"
      )));
    }
  }

  if !status.active {
    let log = host.enable_firewall().await;
    let success = log.success;
    let reason = log.failure_reason();
    logs.push(log);
    if !success {
      return Err(BootstrapError::FirewallError(format!(
        "Failed to enable firewall | {reason}"
      )));
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use brinx_client::entities::container::Protocol;

  use super::*;
  use crate::host::mock::{Failure, MockHost};

  fn rules() -> [FirewallRule; 2] {
    [
      FirewallRule::new(22, Protocol::Tcp),
      FirewallRule::new(5011, Protocol::Tcp),
    ]
  }

  #[tokio::test]
  async fn missing_rules_are_added_before_enable() {
    let host = MockHost::new();
    let mut logs = Vec::new();
    ensure_rules(&host, &rules(), &mut logs).await.unwrap();
    let state = host.state();
    assert_eq!(
      state.calls,
      ["ufw allow 22/tcp", "ufw allow 5011/tcp", "ufw enable"]
    );
    assert!(state.firewall_active);
  }

  #[tokio::test]
  async fn present_rules_are_not_added_again() {
    let host = MockHost::with(|state| {
      state.firewall_active = true;
      state.firewall_rules.extend(rules());
    });
    let mut logs = Vec::new();
    ensure_rules(&host, &rules(), &mut logs).await.unwrap();
    assert!(host.state().calls.is_empty());
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.success));
  }

  #[tokio::test]
  async fn tcp_rule_does_not_satisfy_udp() {
    let host = MockHost::with(|state| {
      state.firewall_active = true;
      state
        .firewall_rules
        .insert(FirewallRule::new(1194, Protocol::Tcp));
    });
    let mut logs = Vec::new();
    ensure_rules(
      &host,
      &[FirewallRule::new(1194, Protocol::Udp)],
      &mut logs,
    )
    .await
    .unwrap();
    assert_eq!(host.state().calls, ["ufw allow 1194/udp"]);
  }

  #[tokio::test]
  async fn allow_failure_stops_before_enable() {
    let host = MockHost::with(|state| {
      state.failures.insert(Failure::FirewallAllow);
    });
    let mut logs = Vec::new();
    let res = ensure_rules(&host, &rules(), &mut logs).await;
    assert!(matches!(res, Err(BootstrapError::FirewallError(_))));
    assert_eq!(host.state().calls, ["ufw allow 22/tcp"]);
    assert!(!host.state().firewall_active);
  }

  #[tokio::test]
  async fn unreadable_status_is_firewall_error() {
    let host = MockHost::with(|state| {
      state.failures.insert(Failure::FirewallStatus);
    });
    let res = ensure_rules(&host, &rules(), &mut Vec::new()).await;
    assert!(matches!(res, Err(BootstrapError::FirewallError(_))));
  }
}
