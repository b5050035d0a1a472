use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use adaptive_bitrate::{AdaptiveController, SharedController};
use config_manager::HandlerConfig;
use control_api::{api_router, ApiState};
use gst_bridge::gst::{attach_rtcp_probe, GstEncoder, GstPipeline};
use gst_bridge::launch::names;
use gst_bridge::{FeedbackTap, LaunchConfig, RTCP_RECV_PAD, RTCP_SEND_PAD};
use gstreamer::glib;
use gstreamer::prelude::*;
use rtcp_feedback::FeedbackDecoder;
use stage_control::{PipelineState, StageController};
use tracing_subscriber::EnvFilter;

/// Video handler
///
/// - Receives H.264 over RTP and republishes it over RTSP
/// - Watches RTCP in both directions and steps encoder bitrate/fps with loss
/// - Lets the control API splice the motioncells stage in and out live
fn main() -> Result<()> {
    let config = HandlerConfig::load();
    init_tracing(&config);

    if let Err(e) = run(config) {
        tracing::error!("Fatal: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// RUST_LOG wins, then LOG_LEVEL, then info
fn init_tracing(config: &HandlerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: HandlerConfig) -> Result<()> {
    config.validate()?;
    let network = config.network()?;
    let bounds = config.bounds()?;

    tracing::info!(
        rtp_port = network.rtp_port,
        rtcp_in = network.rtcp_in,
        rtcp_out = network.rtcp_out,
        camera = %network.camera_ip,
        "Starting video handler {}",
        config.service_version
    );

    gst_bridge::gst::init()?;

    let decoder = Arc::new(FeedbackDecoder::new());
    let controller = SharedController::new(AdaptiveController::new(bounds)?);

    let launch = LaunchConfig {
        rtp_port: network.rtp_port,
        rtcp_in_port: network.rtcp_in,
        rtcp_out_port: network.rtcp_out,
        camera_host: network.camera_ip.clone(),
        rtsp_location: network.rtsp_location.clone(),
        bitrate: bounds.bitrate_max,
        fps: bounds.fps_max,
    };
    let description = launch.description();
    tracing::debug!(%description, "Pipeline description");
    let pipeline = GstPipeline::launch(&description).context("Failed to build pipeline")?;

    // RTCP probes feed the controller from the streaming thread
    let mut tap = FeedbackTap::new(Arc::clone(&decoder), controller.clone());
    if config.adapt_apply {
        let encoder = GstEncoder::new(
            pipeline.element(names::ENCODER)?,
            pipeline.element(names::RATE)?,
        );
        tap = tap.with_encoder(Arc::new(encoder));
    } else {
        tracing::info!("ADAPT_APPLY=false: bitrate/fps targets are logged only");
    }
    let rtpbin = pipeline.element(names::RTPBIN)?;
    attach_rtcp_probe(&rtpbin, RTCP_RECV_PAD, tap.clone())?;
    attach_rtcp_probe(&rtpbin, RTCP_SEND_PAD, tap)?;

    let stage = StageController::new(pipeline.clone(), config.state_change_timeout());
    let api_state = Arc::new(ApiState::new(
        Arc::new(stage),
        controller,
        decoder,
        config.adapt_apply,
        config.service_version.clone(),
    ));

    let main_loop = glib::MainLoop::new(None, false);

    let bus = pipeline.inner().bus().context("Pipeline has no bus")?;
    let loop_clone = main_loop.clone();
    let _bus_watch = bus.add_watch(move |_, msg| {
        use gstreamer::MessageView;
        match msg.view() {
            MessageView::Error(err) => {
                tracing::error!(
                    source = ?err.src().map(|s| s.path_string()),
                    debug = ?err.debug(),
                    "Pipeline error: {}",
                    err.error()
                );
                loop_clone.quit();
            }
            MessageView::Warning(warning) => {
                tracing::warn!("Pipeline warning: {}", warning.error());
            }
            MessageView::Eos(_) => {
                tracing::info!("End of stream");
                loop_clone.quit();
            }
            _ => {}
        }
        glib::ControlFlow::Continue
    })?;

    pipeline
        .request_state(PipelineState::Playing)
        .context("Failed to start pipeline")?;
    tracing::info!("Pipeline playing, publishing to {}", network.rtsp_location);

    // HTTP server runs on tokio; GLib owns the main thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let addr = format!("0.0.0.0:{}", network.api_port);
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind(&addr))
        .with_context(|| format!("Failed to bind control API on {}", addr))?;
    tracing::info!("Control API listening on {}", addr);

    let server = runtime.spawn(async move {
        if let Err(e) = axum::serve(listener, api_router(api_state)).await {
            tracing::error!("Control API stopped: {}", e);
        }
    });

    let loop_for_signal = main_loop.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            loop_for_signal.quit();
        }
    });

    main_loop.run();

    server.abort();
    pipeline.request_state(PipelineState::Null)?;
    runtime.shutdown_timeout(Duration::from_secs(1));
    tracing::info!("Stopped");
    Ok(())
}
