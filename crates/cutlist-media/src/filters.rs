//! Lowering a [`RenderPlan`] to FFmpeg arguments.
//!
//! Every argument is a separate token; nothing here is ever joined into a
//! shell command line.

use std::collections::HashMap;
use std::path::Path;

use cutlist_core::{FrameRate, RationalTime, Resolution};
use cutlist_timeline::{EffectKind, TrackKind};

use crate::plan::{ExtractOp, RenderPlan, SegmentOp, TrackPlan};
use crate::settings::VideoCodec;

/// Sample format every audio segment is converted to before concat.
const AUDIO_FORMAT: &str = "aformat=sample_rates=48000:channel_layouts=stereo";

impl RenderPlan {
    /// Build the FFmpeg argument list for this plan.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into()];

        for input in &self.inputs {
            args.push("-i".into());
            args.push(safe_path(&input.path));
        }

        args.push("-filter_complex".into());
        args.push(self.filter_graph());
        args.extend(["-map".into(), "[outv]".into()]);
        if self.has_audio() {
            args.extend(["-map".into(), "[outa]".into()]);
        }

        let settings = &self.settings;
        args.extend(["-c:v".into(), settings.video_codec.ffmpeg_encoder().into()]);
        if settings.video_codec.uses_bitrate() {
            args.extend(["-b:v".into(), format!("{}k", settings.video_bitrate_kbps)]);
        }
        if settings.video_codec == VideoCodec::ProRes422 {
            args.extend(["-profile:v".into(), "2".into()]);
            args.extend(["-pix_fmt".into(), "yuv422p10le".into()]);
        } else {
            args.extend(["-pix_fmt".into(), "yuv420p".into()]);
        }

        if self.has_audio() {
            args.extend(["-c:a".into(), settings.audio_codec.ffmpeg_encoder().into()]);
            if settings.audio_codec.uses_bitrate() {
                args.extend(["-b:a".into(), format!("{}k", settings.audio_bitrate_kbps)]);
            }
        } else {
            args.push("-an".into());
        }

        args.extend(["-r".into(), rate(settings.frame_rate)]);
        args.extend(["-s".into(), settings.resolution.to_string()]);
        args.extend(["-t".into(), seconds(self.total_duration)]);

        // Performance and stability flags
        args.extend(["-threads".into(), "0".into()]);
        args.extend(["-max_muxing_queue_size".into(), "1024".into()]);
        args.push("-stats".into());

        args.push(safe_path(&self.output_path));
        args
    }

    /// The `-filter_complex` graph: per-segment chains, one `concat` per
    /// track, then the overlay stack to `[outv]` and the mix to `[outa]`.
    pub fn filter_graph(&self) -> String {
        let mut graph = GraphBuilder::new(self);
        graph.split_shared_inputs();

        let track_labels: Vec<String> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| graph.track(index, track))
            .collect();

        graph.composite(&track_labels);
        graph.filters.join(";")
    }
}

struct GraphBuilder<'a> {
    plan: &'a RenderPlan,
    filters: Vec<String>,
    /// Labels still available for each `(input, stream)` pair.
    sources: HashMap<(usize, char), Vec<String>>,
}

impl<'a> GraphBuilder<'a> {
    fn new(plan: &'a RenderPlan) -> Self {
        Self {
            plan,
            filters: Vec::new(),
            sources: HashMap::new(),
        }
    }

    /// An input stream can only be consumed once, so inputs read by several
    /// segments go through `split`/`asplit`.
    fn split_shared_inputs(&mut self) {
        let mut uses: Vec<(usize, char)> = Vec::new();
        for track in &self.plan.tracks {
            let stream = stream_of(track.kind);
            for segment in &track.segments {
                if let SegmentOp::Extract(op) = segment {
                    uses.push((op.input, stream));
                }
            }
        }

        let mut counts: Vec<((usize, char), usize)> = Vec::new();
        for key in uses {
            match counts.iter_mut().find(|(k, _)| *k == key) {
                Some((_, n)) => *n += 1,
                None => counts.push((key, 1)),
            }
        }

        for ((input, stream), count) in counts {
            let labels: Vec<String> = if count == 1 {
                vec![format!("[{input}:{stream}]")]
            } else {
                let labels: Vec<String> = (0..count)
                    .map(|i| format!("[{stream}split{input}_{i}]"))
                    .collect();
                let splitter = if stream == 'v' { "split" } else { "asplit" };
                self.filters.push(format!(
                    "[{input}:{stream}]{splitter}={count}{}",
                    labels.concat()
                ));
                labels
            };
            // Consumed from the back.
            self.sources
                .insert((input, stream), labels.into_iter().rev().collect());
        }
    }

    fn take_source(&mut self, input: usize, stream: char) -> String {
        self.sources
            .get_mut(&(input, stream))
            .and_then(Vec::pop)
            .unwrap_or_else(|| format!("[{input}:{stream}]"))
    }

    /// Emit every segment of a track and their concat; returns the track's
    /// output label.
    fn track(&mut self, index: usize, track: &TrackPlan) -> String {
        let stream = stream_of(track.kind);
        let mut labels = Vec::with_capacity(track.segments.len());
        for (seg, segment) in track.segments.iter().enumerate() {
            let label = format!("[t{index}s{seg}]");
            let chain = match (segment, stream) {
                (SegmentOp::Extract(op), 'v') => {
                    let source = self.take_source(op.input, 'v');
                    format!("{source}{}", self.video_chain(op, track.kind))
                }
                (SegmentOp::Extract(op), _) => {
                    let source = self.take_source(op.input, 'a');
                    format!("{source}{}", audio_chain(op))
                }
                (SegmentOp::Gap { duration }, 'v') => self.video_gap(*duration, track.kind),
                (SegmentOp::Gap { duration }, _) => audio_gap(*duration),
            };
            self.filters.push(format!("{chain}{label}"));
            labels.push(label);
        }

        let out = format!("[t{index}{stream}]");
        let (v, a) = if stream == 'v' { (1, 0) } else { (0, 1) };
        self.filters.push(format!(
            "{}concat=n={}:v={v}:a={a}{out}",
            labels.concat(),
            labels.len()
        ));
        out
    }

    fn video_chain(&self, op: &ExtractOp, kind: TrackKind) -> String {
        let mut chain = vec![format!(
            "trim=start={}:end={}",
            seconds(op.seek_to),
            seconds(op.read_to)
        )];
        if op.speed.is_normal() {
            chain.push("setpts=PTS-STARTPTS".into());
        } else {
            chain.push(format!("setpts=(PTS-STARTPTS)/{}", op.speed.to_f64()));
        }

        let duration = op.duration();
        for effect in &op.effects {
            let filter = match *effect {
                EffectKind::Brightness { value } => Some(format!("eq=brightness={value}")),
                EffectKind::Contrast { value } => Some(format!("eq=contrast={value}")),
                EffectKind::Saturation { value } => Some(format!("eq=saturation={value}")),
                EffectKind::Blur { radius } => Some(format!("boxblur={radius}")),
                EffectKind::Sharpen { amount } => Some(format!("unsharp=5:5:{amount}")),
                EffectKind::Normalize => None,
                EffectKind::FadeIn { duration: d } if op.starts_clip => {
                    Some(format!("fade=t=in:st=0:d={}", seconds(d)))
                }
                EffectKind::FadeOut { duration: d } if op.ends_clip => Some(format!(
                    "fade=t=out:st={}:d={}",
                    seconds(fade_out_start(duration, d)),
                    seconds(d)
                )),
                EffectKind::FadeIn { .. } | EffectKind::FadeOut { .. } => None,
            };
            chain.extend(filter);
        }

        chain.extend(self.conform(kind));
        chain.join(",")
    }

    /// Scale, pad and retime to the output format.
    fn conform(&self, kind: TrackKind) -> Vec<String> {
        let Resolution { width, height } = self.plan.settings.resolution;
        let (pad_color, pix_fmt) = layer_format(kind);
        vec![
            format!("scale={width}:{height}:force_original_aspect_ratio=decrease"),
            format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color={pad_color}"),
            "setsar=1".into(),
            format!("fps={}", rate(self.plan.settings.frame_rate)),
            format!("format={pix_fmt}"),
        ]
    }

    fn video_gap(&self, duration: RationalTime, kind: TrackKind) -> String {
        let (color, pix_fmt) = layer_format(kind);
        format!(
            "color=c={color}:s={}:r={}:d={},format={pix_fmt}",
            self.plan.settings.resolution,
            rate(self.plan.settings.frame_rate),
            seconds(duration)
        )
    }

    fn composite(&mut self, track_labels: &[String]) {
        let plan = self.plan;
        let mut current = match plan.composite.base {
            Some(index) => track_labels[index].clone(),
            None => {
                self.filters.push(format!(
                    "color=c=black:s={}:r={}:d={},format=yuv420p[base]",
                    plan.settings.resolution,
                    rate(plan.settings.frame_rate),
                    seconds(plan.total_duration)
                ));
                "[base]".into()
            }
        };

        for (n, &index) in plan.composite.overlays.iter().enumerate() {
            let out = format!("[layer{n}]");
            self.filters.push(format!(
                "{current}{}overlay=eof_action=pass:format=auto{out}",
                track_labels[index]
            ));
            current = out;
        }
        self.filters.push(format!("{current}format=yuv420p[outv]"));

        match plan.composite.audio.as_slice() {
            [] => {}
            [single] => self
                .filters
                .push(format!("{}anull[outa]", track_labels[*single])),
            many => {
                let inputs: String = many.iter().map(|&i| track_labels[i].as_str()).collect();
                self.filters.push(format!(
                    "{inputs}amix=inputs={}:duration=longest:dropout_transition=0[outa]",
                    many.len()
                ));
            }
        }
    }
}

fn audio_chain(op: &ExtractOp) -> String {
    let mut chain = vec![
        format!(
            "atrim=start={}:end={}",
            seconds(op.seek_to),
            seconds(op.read_to)
        ),
        "asetpts=PTS-STARTPTS".into(),
    ];
    if !op.speed.is_normal() {
        chain.extend(atempo_chain(op.speed.to_f64()));
    }
    if (op.volume - 1.0).abs() > f64::EPSILON {
        chain.push(format!("volume={}", op.volume));
    }

    let duration = op.duration();
    for effect in &op.effects {
        match *effect {
            EffectKind::Normalize => chain.push("loudnorm".into()),
            EffectKind::FadeIn { duration: d } if op.starts_clip => {
                chain.push(format!("afade=t=in:st=0:d={}", seconds(d)));
            }
            EffectKind::FadeOut { duration: d } if op.ends_clip => chain.push(format!(
                "afade=t=out:st={}:d={}",
                seconds(fade_out_start(duration, d)),
                seconds(d)
            )),
            _ => {}
        }
    }

    chain.push(AUDIO_FORMAT.into());
    chain.join(",")
}

fn audio_gap(duration: RationalTime) -> String {
    format!(
        "anullsrc=r=48000:cl=stereo,atrim=duration={},{AUDIO_FORMAT}",
        seconds(duration)
    )
}

/// `atempo` accepts 0.5..=2.0 per instance; larger changes are chained.
fn atempo_chain(mut speed: f64) -> Vec<String> {
    let mut chain = Vec::new();
    while speed > 2.0 {
        chain.push("atempo=2.0".to_string());
        speed /= 2.0;
    }
    while speed < 0.5 {
        chain.push("atempo=0.5".to_string());
        speed /= 0.5;
    }
    chain.push(format!("atempo={speed}"));
    chain
}

/// A fade-out ends with the segment; clamp when it is longer than the segment.
fn fade_out_start(segment: RationalTime, fade: RationalTime) -> RationalTime {
    let start = segment - fade;
    if start.is_negative() {
        RationalTime::ZERO
    } else {
        start
    }
}

fn layer_format(kind: TrackKind) -> (&'static str, &'static str) {
    match kind {
        TrackKind::Overlay => ("black@0.0", "yuva420p"),
        TrackKind::Video | TrackKind::Audio => ("black", "yuv420p"),
    }
}

fn stream_of(kind: TrackKind) -> char {
    if kind.is_visual() {
        'v'
    } else {
        'a'
    }
}

fn seconds(time: RationalTime) -> String {
    format!("{:.6}", time.to_seconds_f64())
}

fn rate(rate: FrameRate) -> String {
    format!("{}/{}", rate.numerator, rate.denominator)
}

/// Keep paths that start with `-` from being read as options.
fn safe_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if text.starts_with('-') {
        format!("./{text}")
    } else {
        text.into_owned()
    }
}
