//! Service manager tests against the scripted server

mod common;

use common::Script;
use firebird_rs::constants::{info, isc, protocol, spb, svc_info};
use firebird_rs::{BackupOptions, Config, Error, ServiceManager};
use tokio::io::AsyncWriteExt;

const SERVICE: i32 = 3;

fn item(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
}

fn line_reply(line: &str) -> Vec<u8> {
    let mut out = Vec::new();
    item(&mut out, svc_info::LINE, line.as_bytes());
    out.push(info::END);
    out
}

/// A script starting with a successful service attach
fn service_attached() -> Script {
    let mut script = Script::default();
    script.accept(protocol::PROTOCOL_VERSION12).ok(SERVICE);
    script
}

async fn attach(script: Script) -> Result<ServiceManager, Error> {
    let (client, mut server) = tokio::io::duplex(1 << 16);
    server.write_all(&script.into_bytes()).await.unwrap();
    tokio::spawn(async move {
        // Keep the server end open and drain requests
        let mut sink = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut server, &mut sink).await;
    });
    let config = Config::new("localhost", "", "SYSDBA", "masterkey");
    ServiceManager::attach_stream(client, config).await
}

mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_server_version() {
        let mut reply = Vec::new();
        item(&mut reply, svc_info::SERVER_VERSION, b"LI-V3.0.11 Firebird 3.0");
        reply.push(info::END);

        let mut script = service_attached();
        script.ok_data(&reply).ok(0);
        let mut service = attach(script).await.unwrap();
        assert_eq!(service.handle().unwrap(), SERVICE);

        assert_eq!(service.server_version().await.unwrap(), "LI-V3.0.11 Firebird 3.0");
        service.detach().await.unwrap();
        assert!(matches!(service.handle(), Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let mut script = service_attached();
        script.ok_data(&[info::END]);
        let mut service = attach(script).await.unwrap();
        assert!(matches!(service.implementation().await, Err(Error::Protocol(_))));
    }
}

mod action_tests {
    use super::*;

    #[tokio::test]
    async fn test_backup_collects_output() {
        let mut script = service_attached();
        script
            .ok(0) // start
            .ok_data(&line_reply("gbak:readied database for backup"))
            .ok_data(&line_reply("gbak:closing file, committing, and finishing."))
            .ok_data(&line_reply(""))
            .ok(0); // detach
        let mut service = attach(script).await.unwrap();

        let lines = service
            .backup("/data/app.fdb", "/backup/app.fbk", &BackupOptions::default())
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("gbak:closing"));
        service.detach().await.unwrap();
    }

    #[tokio::test]
    async fn test_display_users() {
        let mut users = Vec::new();
        item(&mut users, spb::SEC_USERNAME, b"SYSDBA");
        item(&mut users, spb::SEC_FIRSTNAME, b"Sys");
        users.push(spb::SEC_USERID);
        users.extend_from_slice(&0i32.to_le_bytes());
        item(&mut users, spb::SEC_USERNAME, b"ALICE");

        let mut reply = Vec::new();
        item(&mut reply, svc_info::GET_USERS, &users);
        reply.push(info::END);

        let mut script = service_attached();
        script.ok(0).ok_data(&reply);
        let mut service = attach(script).await.unwrap();

        let users = service.display_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user_name, "SYSDBA");
        assert_eq!(users[0].first_name.as_deref(), Some("Sys"));
        assert_eq!(users[0].user_id, Some(0));
        assert_eq!(users[1].user_name, "ALICE");
    }

    #[tokio::test]
    async fn test_rejected_attach() {
        let mut script = Script::default();
        script
            .accept(protocol::PROTOCOL_VERSION12)
            .error(isc::LOGIN);
        let err = attach(script).await.unwrap_err();
        assert_eq!(err.error_code(), Some(isc::LOGIN));
    }
}
