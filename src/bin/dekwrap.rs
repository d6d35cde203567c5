//! dekwrap: envelope encryption with RSA-wrapped data keys
//!
//! Usage:
//!   dekwrap keygen  --name <NAME> [--key-version <V>] [--bits <BITS>]
//!   dekwrap seal    --pub <NAME>.pub --in <FILE> --user <ID> [--aad <AAD>] [--key-version <V>]
//!   dekwrap recover --sec <NAME>.sec --in <FILE>.rec.json [--key-version <V>]
//!   dekwrap inspect --in <FILE>.rec.json
//!
//! Every command also accepts `--config <FILE>` (JSON); `DEKWRAP_*`
//! environment variables override it.

use std::fs;
use std::path::PathBuf;
use std::process;

use dek_envelope::{
    build_backup_record, encrypt, generate_key, generate_nonce, BackupClient, BackupConfig,
    BackupRecord, FileStore, KeyVersion, LocalBackupServer, RecordStore, Sealed, ServerPublicKey,
};
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!(
        "dekwrap: AES-256-GCM payloads, RSA-OAEP wrapped data keys\n\
         \n\
         Generate a server keypair:\n\
         \n\
         dekwrap keygen --name <NAME> [--key-version <V>] [--bits <BITS>]\n\
         Writes <NAME>.pub (SPKI DER) and <NAME>.sec (PKCS#8 DER)\n\
         \n\
         Seal a file for backup:\n\
         \n\
         dekwrap seal --pub <NAME>.pub --in <FILE> --user <ID> [--aad <AAD>] [--key-version <V>]\n\
         Writes <FILE>.rec.json and a copy in the local store\n\
         \n\
         Recover a file (acts as the unwrap server):\n\
         \n\
         dekwrap recover --sec <NAME>.sec --in <FILE>.rec.json [--key-version <V>]\n\
         Writes <FILE> (strips .rec.json, or appends .dec)\n\
         \n\
         Show record metadata:\n\
         \n\
         dekwrap inspect --in <FILE>.rec.json\n"
    );
    process::exit(1);
}

fn die(msg: &str) -> ! {
    eprintln!("error: {}", msg);
    process::exit(1);
}

fn parse_args() -> (String, Vec<(String, String)>) {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let command = args[1].clone();
    let mut flags: Vec<(String, String)> = Vec::new();

    let mut i = 2;
    while i < args.len() {
        if args[i].starts_with("--") && i + 1 < args.len() {
            flags.push((args[i].clone(), args[i + 1].clone()));
            i += 2;
        } else {
            die(&format!("unexpected argument: {}", args[i]));
        }
    }

    (command, flags)
}

fn get_flag(flags: &[(String, String)], name: &str) -> Option<String> {
    flags.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn require_flag(flags: &[(String, String)], name: &str) -> String {
    get_flag(flags, name).unwrap_or_else(|| die(&format!("missing required flag: {}", name)))
}

fn load_config(flags: &[(String, String)]) -> BackupConfig {
    let base = match get_flag(flags, "--config") {
        Some(path) => BackupConfig::from_file(&path).unwrap_or_else(|e| die(&e.to_string())),
        None => BackupConfig::default(),
    };
    base.with_overrides(|name| std::env::var(name).ok())
}

fn key_version(flags: &[(String, String)], config: &BackupConfig) -> KeyVersion {
    get_flag(flags, "--key-version")
        .map(KeyVersion::new)
        .unwrap_or_else(|| config.default_key_version.clone())
}

fn read_record(path: &str) -> BackupRecord {
    let json = fs::read_to_string(path).unwrap_or_else(|e| die(&format!("read {}: {}", path, e)));
    BackupRecord::from_json(&json).unwrap_or_else(|_| die("invalid record file"))
}

fn cmd_keygen(flags: &[(String, String)], config: &BackupConfig) {
    let name = require_flag(flags, "--name");
    let version = key_version(flags, config);
    let bits: usize = get_flag(flags, "--bits")
        .map(|b| b.parse().unwrap_or_else(|_| die("--bits must be a number")))
        .unwrap_or(2048);

    let server = LocalBackupServer::generate(version.clone(), bits)
        .unwrap_or_else(|e| die(&format!("keygen: {}", e)));
    let sec = server
        .secret_key_pkcs8_der()
        .unwrap_or_else(|e| die(&format!("encode secret key: {}", e)));

    let pub_path = format!("{}.pub", name);
    let sec_path = format!("{}.sec", name);

    fs::write(&pub_path, server.public_key_der())
        .unwrap_or_else(|e| die(&format!("write {}: {}", pub_path, e)));
    fs::write(&sec_path, sec.as_slice())
        .unwrap_or_else(|e| die(&format!("write {}: {}", sec_path, e)));

    // Restrict secret key permissions (Unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&sec_path, fs::Permissions::from_mode(0o600)) {
            die(&format!("chmod {}: {}", sec_path, e));
        }
    }

    eprintln!("server keypair generated ({}, {} bits):", version, bits);
    eprintln!("  public key:  {} ({} bytes)", pub_path, server.public_key_der().len());
    eprintln!("  secret key:  {} ({} bytes)", sec_path, sec.len());
    eprintln!();
    eprintln!("keep {0} on the server. ship {1} with the client.", sec_path, pub_path);
}

fn cmd_seal(flags: &[(String, String)], config: &BackupConfig) {
    let pub_file = require_flag(flags, "--pub");
    let in_file = require_flag(flags, "--in");
    let user_id = require_flag(flags, "--user");
    let aad = get_flag(flags, "--aad");
    let version = key_version(flags, config);

    let out_file = format!("{}.rec.json", in_file);

    let der = fs::read(&pub_file).unwrap_or_else(|e| die(&format!("read {}: {}", pub_file, e)));
    let server_pk =
        ServerPublicKey::from_der(&der).unwrap_or_else(|_| die("invalid public key file"));

    let plaintext = fs::read(&in_file).unwrap_or_else(|e| die(&format!("read {}: {}", in_file, e)));
    if plaintext.len() > config.max_input_bytes {
        die(&format!(
            "input too large ({} bytes). limit is {} bytes",
            plaintext.len(),
            config.max_input_bytes
        ));
    }

    let aad_bytes = aad.as_deref().map(str::as_bytes);
    let dek = generate_key().unwrap_or_else(|e| die(&e.to_string()));
    let nonce = generate_nonce().unwrap_or_else(|e| die(&e.to_string()));
    let blob =
        encrypt(&dek, &nonce, &plaintext, aad_bytes).unwrap_or_else(|_| die("encryption failed"));
    let wrapped = server_pk.wrap(&dek).unwrap_or_else(|_| die("key wrap failed"));
    drop(dek);

    let record = build_backup_record(user_id, version, &nonce, &blob, &wrapped, aad_bytes);
    let json = record.to_json().unwrap_or_else(|_| die("serialize record"));
    fs::write(&out_file, &json).unwrap_or_else(|e| die(&format!("write {}: {}", out_file, e)));

    let store = FileStore::new(&config.store_dir).unwrap_or_else(|e| die(&e.to_string()));
    store.put(&record).unwrap_or_else(|e| die(&e.to_string()));

    eprintln!(
        "sealed {} -> {} ({} bytes plaintext -> {} bytes ciphertext, {} byte wrapped key)",
        in_file,
        out_file,
        plaintext.len(),
        blob.len(),
        wrapped.len()
    );
}

fn cmd_recover(flags: &[(String, String)], config: &BackupConfig) {
    let sec_file = require_flag(flags, "--sec");
    let in_file = require_flag(flags, "--in");

    let out_file = if in_file.ends_with(".rec.json") {
        in_file.trim_end_matches(".rec.json").to_string()
    } else {
        format!("{}.dec", in_file)
    };

    // Don't overwrite the input
    if PathBuf::from(&out_file) == PathBuf::from(&in_file) {
        die("output path would overwrite input; rename the input file");
    }

    let record = read_record(&in_file);
    let version = get_flag(flags, "--key-version")
        .map(KeyVersion::new)
        .unwrap_or_else(|| record.key_version.clone());

    let der = fs::read(&sec_file).unwrap_or_else(|e| die(&format!("read {}: {}", sec_file, e)));
    let server = LocalBackupServer::from_pkcs8_der(version, &der)
        .unwrap_or_else(|_| die("invalid secret key file"));

    let client = BackupClient::with_config(&server, config.clone());
    let plaintext = client
        .recover(Sealed::new(record))
        .unwrap_or_else(|e| die(&format!("recovery failed: {}", e)));

    fs::write(&out_file, &plaintext).unwrap_or_else(|e| die(&format!("write {}: {}", out_file, e)));

    eprintln!("recovered {} -> {} ({} bytes)", in_file, out_file, plaintext.len());
}

fn cmd_inspect(flags: &[(String, String)]) {
    let in_file = require_flag(flags, "--in");
    let record = read_record(&in_file);
    let info = record.info().unwrap_or_else(|_| die("record fields are not valid base64"));

    println!("Backup Record");
    println!("=============");
    println!("User:            {}", info.user_id);
    println!("Key Version:     {}", info.key_version);
    println!("AEAD Suite:      {}", info.aead_suite);
    println!("Wrap Suite:      {}", info.wrap_suite);
    println!("AAD:             {}", if info.has_aad { "present" } else { "none" });
    println!();
    println!("Ciphertext:      {} bytes", info.ciphertext_bytes);
    println!("Plaintext Size:  {} bytes", info.plaintext_bytes);
    println!("Wrapped DEK:     {} bytes", info.wrapped_dek_bytes);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (command, flags) = parse_args();
    let config = load_config(&flags);

    match command.as_str() {
        "keygen" => cmd_keygen(&flags, &config),
        "seal" => cmd_seal(&flags, &config),
        "recover" => cmd_recover(&flags, &config),
        "inspect" => cmd_inspect(&flags),
        "--help" | "-h" => usage(),
        "--version" | "-V" => println!("dekwrap {}", dek_envelope::VERSION),
        _ => {
            eprintln!("unknown command: {}", command);
            usage();
        }
    }
}
