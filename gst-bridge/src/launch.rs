//! Launch description of the media graph
//!
//! Elements the handler touches at runtime are named so they can be looked
//! up with `by_name` instead of scanning the bin.

/// Element names registered in the launch description
pub mod names {
    pub const RTPBIN: &str = "rtpbin";
    pub const UPSTREAM: &str = "stage-in";
    pub const STAGE: &str = "stage";
    pub const DOWNSTREAM: &str = "stage-out";
    pub const RATE: &str = "rate";
    pub const ENCODER: &str = "encoder";
}

/// rtpbin pads the RTCP probes attach to
pub const RTCP_RECV_PAD: &str = "recv_rtcp_sink_0";
pub const RTCP_SEND_PAD: &str = "send_rtcp_src_0";

const RTP_CAPS: &str = "application/x-rtp,media=video,clock-rate=90000,payload=96,encoding-name=H264";

/// Network endpoints and initial encoder targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub rtp_port: u16,
    pub rtcp_in_port: u16,
    pub rtcp_out_port: u16,
    /// Receiver reports go back to this host
    pub camera_host: String,
    pub rtsp_location: String,
    /// Initial encoder target in bits per second
    pub bitrate: u32,
    /// Initial frame rate cap
    pub fps: u32,
}

impl LaunchConfig {
    /// Build the `gst-launch` style description
    ///
    /// ```text
    /// udpsrc(RTP) -> rtpbin -> depay -> decode -> stage-in -> stage -> stage-out
    ///     -> rate -> encoder -> rtspclientsink
    /// udpsrc(RTCP) -> rtpbin.recv_rtcp_sink_0
    /// rtpbin.send_rtcp_src_0 -> udpsink(camera)
    /// ```
    pub fn description(&self) -> String {
        format!(
            "rtpbin name={rtpbin} \
             udpsrc address=0.0.0.0 port={rtp_port} caps=\"{caps}\" \
               ! {rtpbin}.recv_rtp_sink_0 \
             {rtpbin}. \
               ! rtph264depay \
               ! avdec_h264 \
               ! videoconvert name={upstream} \
               ! motioncells name={stage} \
               ! videoconvert name={downstream} \
               ! videorate name={rate} drop-only=true max-rate={fps} \
               ! x264enc name={encoder} bitrate={kbps} tune=zerolatency speed-preset=superfast \
               ! rtspclientsink location={location} latency=0 protocols=tcp \
             udpsrc address=0.0.0.0 port={rtcp_in} caps=\"application/x-rtcp\" \
               ! {rtpbin}.{recv_pad} \
             {rtpbin}.{send_pad} \
               ! udpsink host={host} port={rtcp_out} sync=false async=false",
            rtpbin = names::RTPBIN,
            upstream = names::UPSTREAM,
            stage = names::STAGE,
            downstream = names::DOWNSTREAM,
            rate = names::RATE,
            encoder = names::ENCODER,
            recv_pad = RTCP_RECV_PAD,
            send_pad = RTCP_SEND_PAD,
            caps = RTP_CAPS,
            rtp_port = self.rtp_port,
            rtcp_in = self.rtcp_in_port,
            rtcp_out = self.rtcp_out_port,
            host = self.camera_host,
            location = self.rtsp_location,
            kbps = encoder_kbps(self.bitrate),
            fps = self.fps,
        )
    }
}

/// x264enc takes kbit/s
pub fn encoder_kbps(bits_per_second: u32) -> u32 {
    (bits_per_second / 1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LaunchConfig {
        LaunchConfig {
            rtp_port: 5000,
            rtcp_in_port: 5001,
            rtcp_out_port: 5005,
            camera_host: "10.0.0.7".to_string(),
            rtsp_location: "rtsp://localhost:8554/stream".to_string(),
            bitrate: 4_000_000,
            fps: 30,
        }
    }

    #[test]
    fn test_description_names_runtime_elements() {
        let desc = config().description();
        for name in [
            "name=rtpbin",
            "videoconvert name=stage-in",
            "motioncells name=stage",
            "videoconvert name=stage-out",
            "name=encoder",
            "name=rate",
        ] {
            assert!(desc.contains(name), "missing {:?} in {}", name, desc);
        }
    }

    #[test]
    fn test_description_ports_and_targets() {
        let desc = config().description();
        assert!(desc.contains("port=5000"));
        assert!(desc.contains("port=5001"));
        assert!(desc.contains("host=10.0.0.7 port=5005"));
        assert!(desc.contains("bitrate=4000 "));
        assert!(desc.contains("max-rate=30 "));
        assert!(desc.contains("rtpbin.recv_rtcp_sink_0"));
        assert!(desc.contains("rtpbin.send_rtcp_src_0"));
        assert!(desc.contains("location=rtsp://localhost:8554/stream"));
    }

    #[test]
    fn test_encoder_kbps() {
        assert_eq!(encoder_kbps(3_750_000), 3750);
        assert_eq!(encoder_kbps(500), 1);
    }
}
