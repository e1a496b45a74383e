//! Streaming parser for nmap XML output (-oX)

use crate::report::OsGuess;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use surfacescan_core::{Error, PortState, Result, Service};
use tracing::warn;

/// Parsed nmap document, one host per invocation
#[derive(Debug, Default)]
pub struct NmapDocument {
    pub command_line: Option<String>,
    pub host_state: String,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub services: Vec<Service>,
    pub os_matches: Vec<OsGuess>,
    pub elapsed_seconds: f64,
}

/// Parse an nmap XML document
pub fn parse_nmap_xml(xml: &str) -> Result<NmapDocument> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut doc = NmapDocument::default();
    let mut current_service: Option<Service> = None;
    let mut current_os: Option<OsGuess> = None;
    let mut current_element = String::new();
    let mut in_osclass = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                current_element = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match current_element.as_str() {
                    "nmaprun" => {
                        if let Some(args) = attr(e, b"args") {
                            doc.command_line = Some(args);
                        }
                    }
                    "status" => {
                        if let Some(state) = attr(e, b"state") {
                            doc.host_state = state;
                        }
                    }
                    "address" => {
                        // Prefer IPv4; MAC addresses also arrive as <address>
                        let addr_type = attr(e, b"addrtype").unwrap_or_default();
                        if addr_type == "ipv4" || (addr_type == "ipv6" && doc.ip_address.is_none())
                        {
                            doc.ip_address = attr(e, b"addr");
                        }
                    }
                    "hostname" => {
                        if doc.hostname.is_none() {
                            doc.hostname = attr(e, b"name");
                        }
                    }
                    "port" => {
                        let protocol = attr(e, b"protocol").unwrap_or_else(|| "tcp".into());
                        let port: u16 = attr(e, b"portid")
                            .and_then(|p| p.parse().ok())
                            .unwrap_or(0);
                        current_service = Some(Service {
                            port,
                            protocol,
                            state: PortState::OpenFiltered,
                            name: String::from("unknown"),
                            product: None,
                            version: None,
                            banner: None,
                            platform_id: None,
                        });
                    }
                    "state" => {
                        if let (Some(svc), Some(state)) =
                            (current_service.as_mut(), attr(e, b"state"))
                        {
                            svc.state = PortState::parse(&state);
                        }
                    }
                    "service" => {
                        if let Some(svc) = current_service.as_mut() {
                            if let Some(name) = attr(e, b"name") {
                                svc.name = name;
                            }
                            svc.product = attr(e, b"product");
                            svc.version = attr(e, b"version");
                            svc.banner = attr(e, b"extrainfo");
                        }
                    }
                    "osmatch" => {
                        in_osclass = false;
                        current_os = Some(OsGuess {
                            name: attr(e, b"name"),
                            family: None,
                            vendor: None,
                            generation: None,
                            os_type: None,
                            confidence: attr(e, b"accuracy")
                                .and_then(|a| a.parse().ok())
                                .unwrap_or(0),
                            platform_id: None,
                        });
                    }
                    "osclass" => {
                        in_osclass = true;
                        // First osclass wins; later ones repeat the same family
                        if let Some(os) = current_os.as_mut() {
                            if os.family.is_none() {
                                os.family = attr(e, b"osfamily");
                                os.vendor = attr(e, b"vendor");
                                os.generation = attr(e, b"osgen");
                                os.os_type = attr(e, b"type");
                            }
                        }
                    }
                    "finished" => {
                        if let Some(elapsed) = attr(e, b"elapsed") {
                            doc.elapsed_seconds = elapsed.parse().unwrap_or(0.0);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"port" => {
                        if let Some(svc) = current_service.take() {
                            doc.services.push(svc);
                        }
                    }
                    b"osmatch" => {
                        if let Some(os) = current_os.take() {
                            doc.os_matches.push(os);
                        }
                    }
                    b"osclass" => in_osclass = false,
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if current_element == "cpe" {
                    if in_osclass {
                        if let Some(os) = current_os.as_mut() {
                            if os.platform_id.is_none() {
                                os.platform_id = Some(text);
                            }
                        }
                    } else if let Some(svc) = current_service.as_mut() {
                        if svc.platform_id.is_none() {
                            svc.platform_id = Some(text);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Error parsing nmap XML: {}", e);
                return Err(Error::ToolFailed(format!("unparseable XML output: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -sV -T4 -oX - scanme.example.com">
  <host>
    <status state="up" reason="syn-ack"/>
    <address addr="198.51.100.23" addrtype="ipv4"/>
    <hostnames>
      <hostname name="scanme.example.com" type="user"/>
    </hostnames>
    <ports>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack"/>
        <service name="ssh" product="OpenSSH" version="8.9p1" extrainfo="Ubuntu Linux; protocol 2.0">
          <cpe>cpe:/a:openbsd:openssh:8.9p1</cpe>
        </service>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack"/>
        <service name="http" product="nginx" version="1.18.0"/>
      </port>
      <port protocol="tcp" portid="25">
        <state state="filtered" reason="no-response"/>
        <service name="smtp"/>
      </port>
    </ports>
    <os>
      <osmatch name="Linux 5.0 - 5.14" accuracy="96">
        <osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="5.X" accuracy="96">
          <cpe>cpe:/o:linux:linux_kernel:5</cpe>
        </osclass>
      </osmatch>
    </os>
  </host>
  <runstats>
    <finished time="1718000000" elapsed="14.21" exit="success"/>
  </runstats>
</nmaprun>"#;

    #[test]
    fn test_parse_services() {
        let doc = parse_nmap_xml(SAMPLE).unwrap();
        assert_eq!(doc.host_state, "up");
        assert_eq!(doc.ip_address.as_deref(), Some("198.51.100.23"));
        assert_eq!(doc.hostname.as_deref(), Some("scanme.example.com"));
        assert_eq!(doc.services.len(), 3);

        let ssh = &doc.services[0];
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.state, PortState::Open);
        assert_eq!(ssh.product.as_deref(), Some("OpenSSH"));
        assert_eq!(
            ssh.platform_id.as_deref(),
            Some("cpe:/a:openbsd:openssh:8.9p1")
        );

        let smtp = &doc.services[2];
        assert_eq!(smtp.state, PortState::Filtered);
    }

    #[test]
    fn test_parse_os_match() {
        let doc = parse_nmap_xml(SAMPLE).unwrap();
        assert_eq!(doc.os_matches.len(), 1);
        let os = &doc.os_matches[0];
        assert_eq!(os.name.as_deref(), Some("Linux 5.0 - 5.14"));
        assert_eq!(os.family.as_deref(), Some("Linux"));
        assert_eq!(os.generation.as_deref(), Some("5.X"));
        assert_eq!(os.confidence, 96);
        assert_eq!(
            os.platform_id.as_deref(),
            Some("cpe:/o:linux:linux_kernel:5")
        );
    }

    #[test]
    fn test_parse_metadata() {
        let doc = parse_nmap_xml(SAMPLE).unwrap();
        assert!(doc
            .command_line
            .as_deref()
            .unwrap()
            .starts_with("nmap -sV"));
        assert!((doc.elapsed_seconds - 14.21).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_empty_document() {
        let doc = parse_nmap_xml("<nmaprun></nmaprun>").unwrap();
        assert!(doc.services.is_empty());
        assert!(doc.os_matches.is_empty());
    }
}
