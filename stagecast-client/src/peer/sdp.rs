//! Session-description rewriting applied to outgoing answers on the
//! producer side: Opus is promoted to the front of the audio codec list and
//! its format parameters are pinned for low-bandwidth voice delivery.

const OPUS_RTPMAP: &str = " opus/48000";

/// Kilobits per second ensured as `maxaveragebitrate` on the Opus fmtp line.
pub const OPUS_MAX_KBPS: u32 = 128;

/// Full shaping pass for an outgoing answer.
pub fn shape_answer(sdp: &str) -> String {
    shape_opus(&prefer_opus(sdp), OPUS_MAX_KBPS)
}

/// Move the Opus payload type to the front of the `m=audio` codec list so it
/// wins codec selection over any listed alternative. Descriptions without an
/// audio section come back unchanged.
pub fn prefer_opus(sdp: &str) -> String {
    let mut lines: Vec<String> = sdp.split("\r\n").map(str::to_string).collect();

    let Some(m_index) = audio_m_line(&lines) else {
        return sdp.to_string();
    };
    let Some(payload_type) = opus_payload_type(&lines, m_index) else {
        return sdp.to_string();
    };

    let parts: Vec<&str> = lines[m_index].split(' ').collect();
    if parts.len() <= 3 {
        return sdp.to_string();
    }

    let mut codecs: Vec<&str> = vec![payload_type.as_str()];
    codecs.extend(parts[3..].iter().filter(|c| **c != payload_type));
    lines[m_index] = format!("{} {}", parts[..3].join(" "), codecs.join(" "));

    lines.join("\r\n")
}

/// Ensure `maxaveragebitrate`, mono (`stereo=0`) and in-band FEC on the Opus
/// fmtp line, adding the line if the answer has none. Parameters already
/// present are left untouched.
pub fn shape_opus(sdp: &str, max_kbps: u32) -> String {
    let mut lines: Vec<String> = sdp.split("\r\n").map(str::to_string).collect();

    let Some(m_index) = audio_m_line(&lines) else {
        return sdp.to_string();
    };
    let Some(payload_type) = opus_payload_type(&lines, m_index) else {
        return sdp.to_string();
    };

    let bitrate = max_kbps * 1000;
    let fmtp_prefix = format!("a=fmtp:{payload_type}");

    if let Some(fmtp_index) = section_line(&lines, m_index, &fmtp_prefix) {
        let line = &mut lines[fmtp_index];
        if !line.contains("maxaveragebitrate") {
            line.push_str(&format!(";maxaveragebitrate={bitrate}"));
        }
        if !line.contains("stereo") {
            line.push_str(";stereo=0");
        }
        if !line.contains("useinbandfec") {
            line.push_str(";useinbandfec=1");
        }
    } else {
        let rtpmap_prefix = format!("a=rtpmap:{payload_type}");
        if let Some(rtpmap_index) = section_line(&lines, m_index, &rtpmap_prefix) {
            lines.insert(
                rtpmap_index + 1,
                format!("{fmtp_prefix} maxaveragebitrate={bitrate};stereo=0;useinbandfec=1"),
            );
        }
    }

    lines.join("\r\n")
}

fn audio_m_line(lines: &[String]) -> Option<usize> {
    lines.iter().position(|l| l.starts_with("m=audio"))
}

/// Payload type mapped to Opus within the audio section.
fn opus_payload_type(lines: &[String], m_index: usize) -> Option<String> {
    for line in lines.iter().skip(m_index + 1) {
        if line.starts_with("m=") {
            break;
        }
        if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            if rest.contains(OPUS_RTPMAP) {
                return rest.split(' ').next().map(str::to_string);
            }
        }
    }
    None
}

/// First line in the audio section starting with `prefix`.
fn section_line(lines: &[String], m_index: usize, prefix: &str) -> Option<usize> {
    for (offset, line) in lines.iter().enumerate().skip(m_index + 1) {
        if line.starts_with("m=") {
            break;
        }
        if line.starts_with(prefix) {
            return Some(offset);
        }
    }
    None
}
