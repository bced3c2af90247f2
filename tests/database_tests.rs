//! Attachment-level tests against the scripted server

mod common;

use common::{connect, try_connect, Script};
use firebird_rs::constants::{db_info, info, isc, op, protocol};
use firebird_rs::{CancelKind, Error, TransactionOptions};

fn info_reply(items: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (item, value) in items {
        out.push(*item);
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value);
    }
    out.push(info::END);
    out
}

mod connect_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_connection() {
        let mut script = Script::default();
        script.raw(&op::REJECT.to_be_bytes());
        let (db, _server) = try_connect(script).await;
        let err = db.unwrap_err();
        assert_eq!(err.error_code(), Some(isc::CONNECT_REJECT));
    }

    #[tokio::test]
    async fn test_attach_failure() {
        let mut script = Script::default();
        script
            .accept(protocol::PROTOCOL_VERSION12)
            .error(isc::LOGIN);
        let (db, _server) = try_connect(script).await;
        assert_eq!(db.unwrap_err().error_code(), Some(isc::LOGIN));
    }

    #[tokio::test]
    async fn test_negotiated_protocol() {
        let mut script = Script::attached();
        script.ok(0);
        let (db, server) = connect(script).await;
        assert_eq!(db.protocol_version().await.unwrap(), 12);
        assert_eq!(db.handle().await.unwrap(), common::DB_HANDLE);
        db.detach().await.unwrap();

        // The first request on the wire is op_connect
        let requests = server.requests().await;
        assert_eq!(&requests[..4], &op::CONNECT.to_be_bytes());
    }
}

mod info_tests {
    use super::*;

    #[tokio::test]
    async fn test_info_getters() {
        let mut script = Script::attached();
        script
            .ok_data(&info_reply(&[(db_info::PAGE_SIZE, &8192i32.to_le_bytes())]))
            .ok_data(&info_reply(&[
                (db_info::ODS_VERSION, &[12, 0]),
                (db_info::ODS_MINOR_VERSION, &[2, 0]),
            ]))
            .ok_data(&info_reply(&[
                (db_info::ACTIVE_TRANSACTIONS, &17i32.to_le_bytes()),
                (db_info::ACTIVE_TRANSACTIONS, &21i32.to_le_bytes()),
            ]))
            .ok_data(&info_reply(&[(db_info::ATTACHMENT_ID, &3i32.to_le_bytes())]))
            .ok(0);
        let (db, _server) = connect(script).await;

        assert_eq!(db.page_size().await.unwrap(), 8192);
        assert_eq!(db.ods_version().await.unwrap(), "12.2");
        assert_eq!(db.active_transactions().await.unwrap(), vec![17, 21]);
        db.ping().await.unwrap();
        db.detach().await.unwrap();
    }

    #[tokio::test]
    async fn test_info_error_item() {
        let mut script = Script::attached();
        script.ok_data(&[info::ERROR]);
        let (db, _server) = connect(script).await;
        assert!(matches!(
            db.database_info(&[db_info::PAGE_SIZE]).await,
            Err(Error::Protocol(_))
        ));
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_operation_sends_no_reply() {
        let mut script = Script::attached();
        script.ok(0);
        let (db, _server) = connect(script).await;

        db.cancel_operation(CancelKind::Raise).await.unwrap();
        db.detach().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_database_closes() {
        let mut script = Script::attached();
        script.ok(0);
        let (db, _server) = connect(script).await;

        db.drop_database().await.unwrap();
        assert!(db.is_closed());
        assert!(matches!(
            db.begin_transaction(TransactionOptions::default()).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_events_need_tcp() {
        let (db, _server) = connect(Script::attached()).await;
        assert!(matches!(
            db.queue_events(&["ORDER_PLACED"]).await,
            Err(Error::FeatureNotSupported(_))
        ));
        assert!(matches!(
            db.queue_events(&[]).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_with_message() {
        let mut script = Script::attached();
        script.ok(5).ok(0).ok(0).ok(0);
        let (db, _server) = connect(script).await;

        let mut tx = db.begin_transaction(TransactionOptions::new().read_only()).await.unwrap();
        tx.prepare_with(b"node-1").await.unwrap();
        tx.rollback().await.unwrap();
        db.detach().await.unwrap();
    }
}
