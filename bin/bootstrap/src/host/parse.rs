use std::collections::HashSet;

use brinx_client::entities::{
  config::FirewallRule, container::Protocol,
};

use super::FirewallStatus;

/// Parses `ss -Htuln` output into the set of locally bound ports.
///
/// ```text
/// tcp   LISTEN 0      4096         0.0.0.0:22        0.0.0.0:*
/// tcp   LISTEN 0      4096       127.0.0.1:7000      0.0.0.0:*
/// udp   UNCONN 0      0        127.0.0.53%lo:53      0.0.0.0:*
/// tcp   LISTEN 0      4096            [::]:22           [::]:*
/// ```
pub fn parse_listening_ports(ss_output: &str) -> HashSet<u16> {
  ss_output
    .lines()
    .filter_map(|line| line.split_whitespace().nth(4))
    .filter_map(|local| local.rsplit_once(':'))
    .filter_map(|(_, port)| port.parse::<u16>().ok())
    .collect()
}

/// Parses `ufw status` output.
///
/// ```text
/// Status: active
///
/// To                         Action      From
/// --                         ------      ----
/// 22/tcp                     ALLOW       Anywhere
/// 1194/udp                   ALLOW       Anywhere
/// 5011                       ALLOW       Anywhere
/// 22/tcp (v6)                ALLOW       Anywhere (v6)
/// ```
///
/// Rules without a protocol cover both tcp and udp.
/// Named application profiles and port ranges are ignored.
pub fn parse_ufw_status(output: &str) -> FirewallStatus {
  let mut status = FirewallStatus {
    active: output
      .lines()
      .any(|line| line.trim().eq_ignore_ascii_case("status: active")),
    rules: HashSet::new(),
  };
  for line in output.lines() {
    let mut fields = line.split_whitespace();
    let Some(target) = fields.next() else {
      continue;
    };
    if !fields.any(|field| field == "ALLOW") {
      continue;
    }
    match target.split_once('/') {
      Some((port, protocol)) => {
        let (Ok(port), Ok(protocol)) =
          (port.parse::<u16>(), protocol.parse::<Protocol>())
        else {
          continue;
        };
        status.rules.insert(FirewallRule::new(port, protocol));
      }
      None => {
        let Ok(port) = target.parse::<u16>() else {
          continue;
        };
        status.rules.insert(FirewallRule::new(port, Protocol::Tcp));
        status.rules.insert(FirewallRule::new(port, Protocol::Udp));
      }
    }
  }
  status
}

/// Whether `lspci` output lists an NVIDIA device.
pub fn lspci_has_nvidia(output: &str) -> bool {
  output
    .lines()
    .any(|line| line.to_ascii_lowercase().contains("nvidia"))
}

#[cfg(test)]
mod tests {
  use super::*;

  const SS_OUTPUT: &str = "\
tcp   LISTEN 0      4096         0.0.0.0:22        0.0.0.0:*
tcp   LISTEN 0      4096       127.0.0.1:7000      0.0.0.0:*
udp   UNCONN 0      0        127.0.0.53%lo:53      0.0.0.0:*
udp   UNCONN 0      0              *:1194             *:*
tcp   LISTEN 0      4096            [::]:22           [::]:*
tcp   LISTEN 0      511    [::ffff:127.0.0.1]:3000    *:*
";

  #[test]
  fn ss_ports_cover_all_address_forms() {
    let ports = parse_listening_ports(SS_OUTPUT);
    assert_eq!(ports, HashSet::from([22, 7000, 53, 1194, 3000]));
  }

  #[test]
  fn ss_ignores_garbage_lines() {
    let ports = parse_listening_ports("\nState Recv-Q\nudp x y z *:*\n");
    assert!(ports.is_empty());
  }

  const UFW_ACTIVE: &str = "\
Status: active

To                         Action      From
--                         ------      ----
22/tcp                     ALLOW       Anywhere
5011                       ALLOW       Anywhere
OpenSSH                    ALLOW       Anywhere
60000:61000/udp            ALLOW       Anywhere
8080/tcp                   DENY        Anywhere
22/tcp (v6)                ALLOW       Anywhere (v6)
";

  #[test]
  fn ufw_status_collects_allow_rules() {
    let status = parse_ufw_status(UFW_ACTIVE);
    assert!(status.active);
    assert_eq!(
      status.rules,
      HashSet::from([
        FirewallRule::new(22, Protocol::Tcp),
        FirewallRule::new(5011, Protocol::Tcp),
        FirewallRule::new(5011, Protocol::Udp),
      ])
    );
  }

  #[test]
  fn ufw_inactive_has_no_rules() {
    let status = parse_ufw_status("Status: inactive\n");
    assert!(!status.active);
    assert!(status.rules.is_empty());
  }

  #[test]
  fn lspci_detects_nvidia_case_insensitive() {
    assert!(lspci_has_nvidia(
      "01:00.0 VGA compatible controller: NVIDIA Corporation GA102 [GeForce RTX 3090]"
    ));
    assert!(!lspci_has_nvidia(
      "00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 630"
    ));
  }
}
