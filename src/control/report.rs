//! JSON status report for an interface.
//!
//! One report is a single JSON object:
//!
//! ```text
//! {"unit":0,"flags":4,"mru":1500,"clients":1,"queued":0,
//!  "links":[{"id":0,"flags":3,"mru":1500}],
//!  "compressor":{"transmit":"deflate","receive":null},
//!  "stats":{...},"comp_stats":{...},"idle":{"xmit_secs":0,"recv_secs":3}}
//! ```

use std::io::Write;

use serde_json::{json, Value};

use crate::error::Result;
use crate::interface::{Interface, LinkTable};

/// Build the report for one interface.
pub(crate) fn build_report(iface: &Interface, links: &LinkTable) -> Value {
    let attached: Vec<Value> = iface
        .links()
        .iter()
        .filter_map(|id| links.get(id))
        .map(|entry| {
            json!({
                "id": entry.id,
                "flags": entry.flags.bits(),
                "mru": entry.mru,
            })
        })
        .collect();

    let (transmit, receive) = iface.compressor_names();
    let idle = iface.idle();

    json!({
        "unit": iface.unit(),
        "flags": iface.flags().bits(),
        "mru": iface.mru(),
        "clients": iface.clients,
        "queued": iface.queue_len(),
        "links": attached,
        "compressor": {
            "transmit": transmit,
            "receive": receive,
        },
        "stats": iface.stats(),
        "comp_stats": iface.comp_stats(),
        "idle": {
            "xmit_secs": idle.xmit_idle.as_secs(),
            "recv_secs": idle.recv_idle.as_secs(),
        },
    })
}

/// Write a report as one line followed by `\n` and flush.
pub fn write_report<W: Write>(writer: &mut W, report: &Value) -> Result<()> {
    let line = serde_json::to_string(report)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use std::collections::BTreeMap;

    #[test]
    fn test_report_fields() {
        let iface = Interface::new(3, &RegistryConfig::default(), None);
        let report = build_report(&iface, &BTreeMap::new());

        assert_eq!(report["unit"], 3);
        assert_eq!(report["mru"], 1500);
        assert_eq!(report["clients"], 1);
        assert_eq!(report["links"], json!([]));
        assert!(report["compressor"]["transmit"].is_null());
        assert_eq!(report["stats"]["rx_packets"], 0);
        assert_eq!(report["comp_stats"]["transmit"]["comp_bytes"], 0);
    }

    #[test]
    fn test_write_report_is_one_line() {
        let mut out = Vec::new();
        write_report(&mut out, &json!({"unit": 0})).unwrap();
        assert_eq!(out, b"{\"unit\":0}\n");
    }
}
