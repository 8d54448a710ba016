//! Conversion between canonical addresses (`628xx@c.us`, `id@g.us`) and
//! transport JIDs. Chats on any other server (`@lid`, `@newsletter`, ...)
//! keep their server so replies reach the same chat.

use wabridge_core::error::BridgeError;
use wacore_binary::jid::Jid;

const USER_SERVER: &str = "s.whatsapp.net";
const GROUP_SERVER: &str = "g.us";

/// Parse a canonical address into a transport JID.
pub fn to_jid(address: &str) -> Result<Jid, BridgeError> {
    let address = address.trim();
    let (user, server) = match address.split_once('@') {
        Some((user, "c.us")) => (user, USER_SERVER),
        Some((user, server)) => (user, server),
        None => (address, USER_SERVER),
    };
    if user.is_empty() {
        return Err(BridgeError::Session(format!(
            "invalid whatsapp address '{address}'"
        )));
    }

    format!("{user}@{server}")
        .parse()
        .map_err(|e| BridgeError::Session(format!("invalid whatsapp address '{address}': {e}")))
}

/// Canonical address for a transport JID.
pub fn canonical_address(jid: &Jid) -> String {
    match jid.server.as_str() {
        USER_SERVER => format!("{}@c.us", jid.user),
        GROUP_SERVER => format!("{}@{GROUP_SERVER}", jid.user),
        server => format!("{}@{server}", jid.user),
    }
}
