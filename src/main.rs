//! Demo producer: pushes a synthetic test pattern into the virtual camera

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use flume::bounded;
use tracing::{error, info, warn};

use huahua_vcam::{Channel, ChannelConfig, FrameRequest, SendError};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FPS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("huahua_vcam=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Virtual camera producer launching...");

    let config = load_config()?;
    info!("Publishing as {:?}", config.region_name());

    let channel = Arc::new(Channel::new(config));
    channel.open()?;

    // Set up tx/rx between the pattern generator and the sender loop
    let (tx, rx) = bounded::<FrameRequest>(4);

    // Spawn generator task
    let _generator = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(1000 / FPS));
        let mut tick = 0u32;
        loop {
            interval.tick().await;
            let frame = test_pattern(WIDTH, HEIGHT, tick);
            tick = tick.wrapping_add(1);
            if tx.send_async(frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = rx.recv_async() => {
                let Ok(frame) = frame else { break };
                match Arc::clone(&channel).send_async(frame).await {
                    Ok(()) => {}
                    Err(failure) if matches!(failure.kind(), SendError::LockTimeout(_)) => {
                        // Consumer is holding the lock; drop this frame
                        metrics::counter!("vcam_frames_dropped").increment(1);
                        warn!("write lock busy, frame dropped");
                    }
                    Err(failure) => {
                        error!("Send error: {}", failure);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }
    }

    channel.close();
    info!("Producer shutting down");
    Ok(())
}

/// Load configuration, with an optional vcam.toml overriding the defaults
fn load_config() -> Result<ChannelConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("vcam").required(false))
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Moving diagonal gradient in top-down BGRA
fn test_pattern(width: u32, height: u32, tick: u32) -> FrameRequest {
    let mut data = vec![0u8; (width * height * 4) as usize];
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        px[0] = ((x + tick) % 256) as u8; // B
        px[1] = ((y + tick) % 256) as u8; // G
        px[2] = ((x + y) % 256) as u8; // R
        px[3] = 255; // A
    }
    FrameRequest::new(data, width, height)
}
