//! FIFO CLI Demo
//!
//! Lines typed on stdin are written to the device; two readers print what
//! they get in small chunks while a poll monitor reports readiness changes.
//! On end of input the demo waits for the readers to drain the store, then
//! interrupts them.
//!
//! Usage: `fifo_demo [config.json]`

use embedded_io_async::{Read, Write};
use globalfifo::{DeviceConfig, DeviceError, File, GlobalFifo};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DeviceConfig::from_path(path)?,
        None => DeviceConfig::default(),
    };
    let fifo = Arc::new(GlobalFifo::new(config)?);
    info!("Device ready: {fifo:?}");

    // Poll monitor, like select() on a non-blocking descriptor
    let monitor_file = File::open_nonblocking(&fifo);
    let mut readiness = monitor_file.subscribe()?;
    info!("Poll monitor: initial state {}", monitor_file.poll_state()?);
    let monitor_task = tokio::spawn(async move {
        while let Ok(state) = readiness.recv().await {
            if state.readable {
                info!("Poll monitor: can be read");
            }
            if state.writable {
                info!("Poll monitor: can be written");
            }
        }
    });

    let mut reader1 = File::open(&fifo);
    let mut reader2 = File::open(&fifo);
    let reader1_task = tokio::spawn(async move { read_all("r1", &mut reader1).await });
    let reader2_task = tokio::spawn(async move { read_all("r2", &mut reader2).await });

    let mut writer = File::open(&fifo);
    println!("Enter text (end of input to quit):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let data = format!("{line}\n");
        if let Err(e) = write_all(&mut writer, data.as_bytes()).await {
            eprintln!("Write error: {e}");
            break;
        }
    }
    drop(writer);

    // Readers that already stopped can not drain the rest
    while !fifo.is_empty() && !(reader1_task.is_finished() && reader2_task.is_finished()) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    fifo.interrupt_all();

    let (result1, result2) = tokio::join!(reader1_task, reader2_task);
    for (name, result) in [("r1", result1), ("r2", result2)] {
        if let Err(e) = result {
            error!("Reader {name} task failed: {e}");
        }
    }
    monitor_task.abort();
    drop(monitor_file);

    println!("All tasks completed");
    Ok(())
}

async fn write_all(file: &mut File, mut data: &[u8]) -> Result<(), DeviceError> {
    while !data.is_empty() {
        let n = file.write(data).await?;
        data = &data[n..];
    }
    Ok(())
}

async fn read_all(name: &str, reader: &mut File) {
    let mut buf = [0u8; 4];

    loop {
        match reader.read(&mut buf).await {
            Ok(n) => {
                let data = String::from_utf8_lossy(&buf[..n]);
                println!("({name}): {data:?}");
            }
            Err(DeviceError::Interrupted) => {
                println!("({name}) interrupted");
                break;
            }
            Err(e) => {
                eprintln!("({name}) Error: {e}");
                break;
            }
        }
    }
}
