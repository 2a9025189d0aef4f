// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end exercise of the wired pipeline: a forward frame written to
//! the TCP socket comes out as a committed spool pair.

use nmp_checker::{Checker, Normalizer, RecordSink};
use nmp_core::sink::{CheckResultSink, RecordSetSink, SpoolSink};
use nmp_core::{Worker, WorkerSet};
use nmp_forward::ForwardInput;
use nmp_spool::{Formatter, SpoolWriter};
use rmpv::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const CONFIG: &str = r#"
check_results_dir = "unused"

check "cpu-idle" {
  plugin        = "cpu"
  type          = "cpu"
  type_instance = "idle"
  comparator    = "<"
  warning       = "20"
  critical      = "10"
  value         = "values[0]"
}
"#;

fn message_frame() -> Vec<u8> {
    let frame = Value::Array(vec![
        Value::from("collectd"),
        Value::from(1_700_000_000u64),
        Value::Map(vec![
            (Value::from("host"), Value::from("h1")),
            (Value::from("plugin"), Value::from("cpu")),
            (Value::from("type"), Value::from("cpu")),
            (Value::from("type_instance"), Value::from("idle")),
            (
                Value::from("values"),
                Value::Array(vec![Value::from(88.5)]),
            ),
        ]),
    ]);
    let mut bytes = Vec::new();
    rmpv::encode::write_value(&mut bytes, &frame).unwrap();
    bytes
}

async fn wait_for_spool_pair(dir: &Path) -> (String, String) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        if names.len() >= 2 {
            names.sort();
            return (names[0].clone(), names[1].clone());
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no spool pair appeared"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg_attr(miri, ignore)]
#[tokio::test]
async fn forward_frame_becomes_a_committed_spool_file() {
    let spool_dir = tempfile::tempdir().unwrap();
    let config: nmp_config::Config = {
        let text = CONFIG.replace("unused", &spool_dir.path().display().to_string());
        hcl::from_str(&text).unwrap()
    };
    let rules = nmp_checker::index_rules(&config.check).unwrap();

    let writer = Arc::new(SpoolWriter::new(&config.check_results_dir));
    let formatter = Arc::new(Formatter::new(Arc::clone(&writer) as Arc<dyn SpoolSink>));
    let checker = Arc::new(Checker::new(
        rules,
        None,
        Arc::clone(&formatter) as Arc<dyn CheckResultSink>,
    ));
    let normalizer = Arc::new(Normalizer::new(
        config.tags.clone(),
        Arc::clone(&checker) as Arc<dyn RecordSink>,
    ));
    let input = Arc::new(
        ForwardInput::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::clone(&normalizer) as Arc<dyn RecordSetSink>,
        )
        .await
        .unwrap(),
    );
    let forward_addr = input.local_addr();

    let mut workers = WorkerSet::new();
    workers.add(Arc::clone(&input) as Arc<dyn Worker>);
    workers.add(Arc::clone(&normalizer) as Arc<dyn Worker>);
    workers.add(Arc::clone(&checker) as Arc<dyn Worker>);
    workers.add(Arc::clone(&formatter) as Arc<dyn Worker>);
    workers.add(Arc::clone(&writer) as Arc<dyn Worker>);
    workers.start_all();

    let mut conn = TcpStream::connect(forward_addr).await.unwrap();
    conn.write_all(&message_frame()).await.unwrap();

    let (payload_name, sentinel_name) = wait_for_spool_pair(spool_dir.path()).await;
    assert_eq!(format!("{payload_name}.ok"), sentinel_name);

    let payload = std::fs::read_to_string(spool_dir.path().join(&payload_name)).unwrap();
    assert!(payload.starts_with("### NMP Check ###\n"), "{payload}");
    assert!(payload.contains("host_name=h1\n"));
    assert!(payload.contains("service_description=cpu-idle\n"));
    assert!(payload.contains("return_code=0\n"));
    assert!(payload.contains("output=88.5\n"));

    drop(conn);
    workers.stop_all();
    tokio::time::timeout(Duration::from_secs(5), workers.join_all())
        .await
        .expect("pipeline did not shut down");
}
