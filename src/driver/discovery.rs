//! IP discovery: asking the voice server how our media socket looks from outside.

use super::connection::error::{Error, Result};
use crate::constants::IP_DISCOVERY_LENGTH;
use discortp::discord::{IpDiscoveryPacket, IpDiscoveryType, MutableIpDiscoveryPacket};
use std::{net::IpAddr, str::FromStr, time::Duration};
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, instrument};

/// Sends a discovery request for `ssrc`, returning our external address and port.
///
/// Datagrams which are not a response for `ssrc` are skipped until `wait` runs out.
#[instrument(skip(udp))]
pub(crate) async fn discover(udp: &UdpSocket, ssrc: u32, wait: Duration) -> Result<(IpAddr, u16)> {
    let mut bytes = [0; IpDiscoveryPacket::const_packet_size()];
    {
        let mut view =
            MutableIpDiscoveryPacket::new(&mut bytes[..]).ok_or(Error::IllegalDiscoveryResponse)?;
        view.set_pkt_type(IpDiscoveryType::Request);
        view.set_length(IP_DISCOVERY_LENGTH);
        view.set_ssrc(ssrc);
    }

    udp.send(&bytes).await?;

    timeout(wait, await_response(udp, ssrc)).await?
}

async fn await_response(udp: &UdpSocket, ssrc: u32) -> Result<(IpAddr, u16)> {
    let mut bytes = [0; IpDiscoveryPacket::const_packet_size()];

    loop {
        let len = udp.recv(&mut bytes).await?;
        if let Some(addr) = parse_response(&bytes[..len], ssrc)? {
            return Ok(addr);
        }
    }
}

fn parse_response(bytes: &[u8], ssrc: u32) -> Result<Option<(IpAddr, u16)>> {
    let Some(view) = IpDiscoveryPacket::new(bytes) else {
        debug!("Skipping {}B datagram while awaiting IP discovery.", bytes.len());
        return Ok(None);
    };

    if view.get_ssrc() != ssrc {
        debug!("Skipping IP discovery response for SSRC {}.", view.get_ssrc());
        return Ok(None);
    }

    if view.get_pkt_type() != IpDiscoveryType::Response {
        return Err(Error::IllegalDiscoveryResponse);
    }

    // We could do something clever like binary search,
    // but possibility of UDP spoofing precludes us from
    // making the assumption we can find a "left edge" of '\0's.
    let address_raw = view.get_address_raw();
    let nul_byte_index = address_raw
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::IllegalIp)?;

    let address_str =
        std::str::from_utf8(&address_raw[..nul_byte_index]).map_err(|_| Error::IllegalIp)?;
    let address = IpAddr::from_str(address_str).map_err(|_| Error::IllegalIp)?;

    Ok(Some((address, view.get_port())))
}
