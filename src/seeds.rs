//! Built-in default content: the CompTIA certification catalog and motivational quotes.
//! Both can be replaced from the TOML bot config.

use crate::domain::Certification;

fn cert(code: &str, name: &str, description: &str, domains: &[&str]) -> Certification {
  Certification {
    code: code.into(),
    name: name.into(),
    description: description.into(),
    domains: domains.iter().map(|d| d.to_string()).collect(),
  }
}

/// Default certification tracks with their exam domains.
pub fn seed_certifications() -> Vec<Certification> {
  vec![
    cert(
      "A+",
      "CompTIA A+ (Core 1 & Core 2)",
      "Entry-level IT certification covering hardware, networking, mobile devices, and troubleshooting",
      &[
        "Mobile Devices",
        "Networking",
        "Hardware",
        "Virtualization and Cloud Computing",
        "Hardware and Network Troubleshooting",
        "Operating Systems",
        "Security",
        "Software Troubleshooting",
        "Operational Procedures",
      ],
    ),
    cert(
      "Security+",
      "CompTIA Security+",
      "Foundation-level cybersecurity certification",
      &[
        "Attacks, Threats, and Vulnerabilities",
        "Architecture and Design",
        "Implementation",
        "Operations and Incident Response",
        "Governance, Risk, and Compliance",
      ],
    ),
    cert(
      "Network+",
      "CompTIA Network+",
      "Networking fundamentals certification",
      &[
        "Networking Fundamentals",
        "Network Implementations",
        "Network Operations",
        "Network Security",
        "Network Troubleshooting",
      ],
    ),
    cert(
      "CySA+",
      "CompTIA Cybersecurity Analyst (CySA+)",
      "Intermediate cybersecurity analyst certification",
      &[
        "Threat and Vulnerability Management",
        "Software and Systems Security",
        "Security Operations and Monitoring",
        "Incident Response",
        "Compliance and Assessment",
      ],
    ),
  ]
}

pub fn seed_quotes() -> Vec<String> {
  [
    "Cybersecurity is not a product, but a process. – Bruce Schneier",
    "There are only two types of companies in the world: those that have been breached and know it, and those that have been breached and don't know it yet",
    "It takes 20 years to build a reputation and a few minutes of a cyber-incident to ruin it",
    "Total security would mean no connectivity, cybersecurity is about balance",
    "Security is always excessive until it's not enough. – Robbie Sinclair",
    "Only amateurs attack machines. Professionals target people. – Bruce Schneier",
  ]
  .iter()
  .map(|q| q.to_string())
  .collect()
}
