use std::num::{NonZeroU16, NonZeroU32};

use brinx_client::entities::error::BootstrapError;

use crate::host::HostEnvironment;

/// Finds the lowest port `>= start` which nothing on the host
/// is bound to, over any protocol or interface.
///
/// The bound set is read from the host on every call, so a
/// port taken by a container started after a previous call is
/// seen by the next one. At most `window` ports are checked,
/// and the scan never wraps past 65535.
#[instrument(level = "debug", skip(host))]
pub async fn find_available_port<H: HostEnvironment>(
  host: &H,
  start: NonZeroU16,
  window: NonZeroU32,
) -> Result<u16, BootstrapError> {
  let start = start.get();
  let bound = host
    .bound_ports()
    .await
    .map_err(BootstrapError::host_query)?;

  let end = u32::from(start)
    .saturating_add(window.get() - 1)
    .min(u32::from(u16::MAX)) as u16;

  match (start..=end).find(|port| !bound.contains(port)) {
    Some(port) => {
      debug!("port {port} is free (searched from {start})");
      Ok(port)
    }
    None => Err(BootstrapError::ResourceExhausted {
      start,
      end,
      checked: u32::from(end - start) + 1,
    }),
  }
}
