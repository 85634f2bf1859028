/*!
 * Terminal rendering helpers.
 *
 * Everything here returns plain strings; the controller decides where they go.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

use crate::game::filter::classify;
use crate::game::session::{ClipStatus, SessionSnapshot, SessionState};
use crate::models::{CatalogStatus, GameMode, SentenceCandidate};

static EPISODE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid episode regex"));

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format an episode id as `第N集` using its first digit run
pub fn format_episode(episode_id: &str) -> String {
    match EPISODE_NUMBER.find(episode_id) {
        Some(number) => format!("第{}集", number.as_str()),
        None => episode_id.to_string(),
    }
}

/// One candidate line: text, source and timing
pub fn candidate_line(
    candidate: &SentenceCandidate,
    mode: GameMode,
    catalog: Option<&CatalogStatus>,
) -> String {
    let corpus = catalog
        .map(|c| c.corpus_name(&candidate.corpus_id))
        .unwrap_or(&candidate.corpus_id);

    let mut line = format!(
        "{}  [{} {} {}]",
        candidate.text,
        corpus,
        format_episode(&candidate.episode_id),
        format_time(candidate.start_seconds)
    );

    if mode == GameMode::Dialogue {
        let _ = write!(line, "  {}", classify(&candidate.text).label());
        if let Some(score) = candidate.match_score {
            let _ = write!(line, "  匹配度 {:.0}%", score * 100.0);
        }
    }
    line
}

/// Hint shown when a fetch returned nothing
pub fn empty_hint(state: SessionState) -> Option<&'static str> {
    match state {
        SessionState::AwaitingPromptSelection => Some("没有找到开场句，输入 r 换一批"),
        SessionState::InProgress => Some("没有找到可以接上的句子，输入 r 重试或 b 返回上一步"),
        _ => None,
    }
}

/// Full screen for one snapshot
pub fn render_snapshot(snapshot: &SessionSnapshot, catalog: Option<&CatalogStatus>) -> String {
    let session = &snapshot.session;
    let mode = session.mode();
    let mut out = String::new();

    let _ = writeln!(out, "== {} ({}) ==", mode.title(), session.short_id());

    if !session.log().is_empty() {
        let _ = writeln!(out, "已选 {} 句:", session.log().len());
        for entry in session.log() {
            let _ = writeln!(out, "  {}. {}", entry.step, entry.sentence.text);
        }
    }

    match session.state() {
        SessionState::NotStarted => {
            let _ = writeln!(out, "输入 g 开始新游戏");
        }
        SessionState::ConfirmingStart | SessionState::ConfirmingNext => {
            if let Some(pending) = session.pending_selection() {
                let _ = writeln!(out, "待确认: {}", candidate_line(pending, mode, catalog));
            }
            let clip = match session.pending_clip() {
                ClipStatus::Loading => "视频片段生成中...".to_string(),
                ClipStatus::Ready(clip) => format!("视频片段: {}", clip),
                ClipStatus::Absent => "视频片段生成失败，输入 c 重试".to_string(),
            };
            let _ = writeln!(out, "{}", clip);
            let _ = writeln!(out, "y 确认 / n 取消");
        }
        SessionState::Exporting => {
            let _ = writeln!(out, "正在合成视频...");
        }
        SessionState::AwaitingPromptSelection | SessionState::InProgress => {
            let offered = snapshot.offered();
            let loading = snapshot.prompts_loading || snapshot.next_loading;
            if offered.is_empty() {
                if loading {
                    let _ = writeln!(out, "加载中...");
                } else if let Some(hint) = empty_hint(session.state()) {
                    let _ = writeln!(out, "{}", hint);
                }
            }
            for (i, candidate) in offered.iter().enumerate() {
                let _ = writeln!(out, "  [{}] {}", i + 1, candidate_line(candidate, mode, catalog));
            }
        }
    }

    if let Some(artifact) = session.export_artifact() {
        let _ = writeln!(
            out,
            "合成完成: {} ({} 个片段) {}",
            artifact.file_name, artifact.clip_count, artifact.reference
        );
    }
    if let Some(error) = session.last_error() {
        let _ = writeln!(out, "错误: {}", error);
    }
    out
}

/// Corpus list with statistics
pub fn render_catalog(catalog: &CatalogStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "状态: {}  共 {} 集 {} 条字幕",
        catalog.status, catalog.total_episodes, catalog.total_subtitles
    );
    for corpus in &catalog.corpora {
        let stats = catalog.stats.get(&corpus.id);
        let _ = writeln!(
            out,
            "  {} ({}): {} 集, {} 条字幕",
            corpus.name,
            corpus.id,
            stats.map_or(0, |s| s.episode_count),
            stats.map_or(0, |s| s.subtitle_count)
        );
    }
    out
}

pub const HELP: &str = "\
数字 选择句子
y    确认选择
n    取消选择
c    重新生成视频片段
r    换一批
b    返回上一步
e    合成并下载视频
g    新游戏
q    退出
?    帮助";
