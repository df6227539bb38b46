//! Mapping between wire port numbers and node connector ids.
//!
//! Connector ids take the form `openflow:<datapath-id>:<port>` where `<port>`
//! is either the decimal number of a physical port or the logical name of a
//! reserved one (`openflow:1:LOCAL`).

use ofstats_wire::port_no;

use crate::error::TranslationError;

const RESERVED: [(u32, &str); 8] = [
    (port_no::IN_PORT, "IN_PORT"),
    (port_no::TABLE, "TABLE"),
    (port_no::NORMAL, "NORMAL"),
    (port_no::FLOOD, "FLOOD"),
    (port_no::ALL, "ALL"),
    (port_no::CONTROLLER, "CONTROLLER"),
    (port_no::LOCAL, "LOCAL"),
    (port_no::ANY, "ANY"),
];

/// Logical name of a reserved port number.
pub fn logical_name(port: u32) -> Option<&'static str> {
    RESERVED
        .iter()
        .find(|(number, _)| *number == port)
        .map(|(_, name)| *name)
}

/// Reserved port number for a logical name.
pub fn port_from_logical_name(name: &str) -> Option<u32> {
    RESERVED
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
        .map(|(number, _)| *number)
}

pub fn is_physical(port: u32) -> bool {
    (1..=port_no::MAX).contains(&port)
}

/// Connector id for a wire port number on the given datapath.
pub fn connector_id(datapath_id: u64, port: u32) -> Result<String, TranslationError> {
    if is_physical(port) {
        return Ok(format!("openflow:{datapath_id}:{port}"));
    }
    logical_name(port)
        .map(|name| format!("openflow:{datapath_id}:{name}"))
        .ok_or(TranslationError::UnresolvedPort {
            datapath_id,
            port_no: port,
        })
}

/// Wire port number of a connector id on the given datapath.
///
/// The last segment may be a number or a logical name; a bare logical name
/// (`CONTROLLER`) is accepted as well.
pub fn port_number(datapath_id: u64, connector: &str) -> Result<u32, TranslationError> {
    let invalid = || TranslationError::InvalidConnector(connector.to_string());

    let segments: Vec<&str> = connector.split(':').collect();
    let port_segment = match segments.as_slice() {
        [name] => *name,
        ["openflow", dpid, port] => {
            if dpid.parse::<u64>().ok() != Some(datapath_id) {
                return Err(invalid());
            }
            *port
        }
        _ => return Err(invalid()),
    };

    if let Some(reserved) = port_from_logical_name(port_segment) {
        return Ok(reserved);
    }
    let number: u32 = port_segment.parse().map_err(|_| invalid())?;
    if is_physical(number) {
        Ok(number)
    } else {
        Err(TranslationError::UnresolvedPort {
            datapath_id,
            port_no: number,
        })
    }
}
