//! Export document assembly, rendering and output.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::{
    from_unix_secs, parse_slack_ts, AppError, Attachment, Channel, ChannelInfo, Compression,
    ExportAttachment, ExportDocument, ExportEdit, ExportFile, ExportMessage, ExportMetadata,
    ExportOptions, ExportProfile, ExportReaction, ExportStatistics, ExportUser, Message,
    OutputFormat, Result, SlackFile, ThreadedMessage, User, EXPORTED_BY,
};

/// A file written by [`write_output`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Final path, including any compression suffix.
    pub path: PathBuf,
    /// On-disk size in bytes.
    pub size: u64,
}

/// Drop content the export options exclude.
pub fn apply_content_filters(messages: &mut [ThreadedMessage], options: &ExportOptions) {
    if options.include_files && options.include_reactions {
        return;
    }

    for threaded in messages {
        strip(&mut threaded.message, options);
        for reply in &mut threaded.replies {
            strip(reply, options);
        }
    }
}

fn strip(msg: &mut Message, options: &ExportOptions) {
    if !options.include_files {
        msg.files.clear();
    }
    if !options.include_reactions {
        msg.reactions.clear();
    }
}

/// Convert a top-level message and its replies.
#[must_use]
pub fn to_export_message(threaded: &ThreadedMessage) -> ExportMessage {
    ExportMessage {
        replies: threaded.replies.iter().map(to_export_reply).collect(),
        ..to_export_reply(&threaded.message)
    }
}

/// Convert a single message without replies.
#[must_use]
pub fn to_export_reply(msg: &Message) -> ExportMessage {
    ExportMessage {
        id: msg.ts.clone(),
        user: msg.user.clone(),
        text: msg.text.clone(),
        timestamp: parse_slack_ts(&msg.ts).ok(),
        kind: msg.kind.clone(),
        subtype: msg.subtype.clone(),
        edited: msg.edited.as_ref().and_then(|edit| {
            parse_slack_ts(&edit.ts).ok().map(|ts| ExportEdit {
                user: edit.user.clone(),
                ts,
            })
        }),
        thread_ts: msg.thread_ts.clone(),
        reply_count: msg.reply_count,
        replies: Vec::new(),
        attachments: msg.attachments.iter().map(to_export_attachment).collect(),
        files: msg.files.iter().map(to_export_file).collect(),
        reactions: msg
            .reactions
            .iter()
            .map(|r| ExportReaction {
                name: r.name.clone(),
                count: r.count,
                users: r.users.clone(),
            })
            .collect(),
        bot_id: msg.bot_id.clone(),
        username: msg.username.clone(),
    }
}

fn to_export_attachment(att: &Attachment) -> ExportAttachment {
    ExportAttachment {
        id: att.id.to_string(),
        title: att.title.clone(),
        text: att.text.clone(),
        fallback: att.fallback.clone(),
        color: att.color.clone(),
        image_url: att.image_url.clone(),
        thumb_url: att.thumb_url.clone(),
    }
}

fn to_export_file(file: &SlackFile) -> ExportFile {
    ExportFile {
        id: file.id.clone(),
        name: file.name.clone(),
        title: file.title.clone(),
        mimetype: file.mimetype.clone(),
        filetype: file.filetype.clone(),
        size: file.size,
        url_private: file.url_private.clone(),
        timestamp: file.created.and_then(from_unix_secs),
    }
}

#[must_use]
pub fn to_export_user(user: &User) -> ExportUser {
    let profile = &user.profile;
    ExportUser {
        id: user.id.clone(),
        name: user.name.clone(),
        real_name: user.real_name.clone(),
        profile: ExportProfile {
            display_name: profile.display_name.clone(),
            real_name: profile.real_name.clone(),
            email: profile.email.clone(),
            image_24: profile.image_24.clone(),
            image_32: profile.image_32.clone(),
            image_48: profile.image_48.clone(),
            image_72: profile.image_72.clone(),
            image_192: profile.image_192.clone(),
            image_512: profile.image_512.clone(),
        },
        is_bot: user.is_bot,
        deleted: user.deleted,
    }
}

#[must_use]
pub fn to_channel_info(channel: &Channel) -> ChannelInfo {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    ChannelInfo {
        id: channel.id.clone(),
        name: channel.name.clone(),
        is_private: channel.is_private,
        is_archived: channel.is_archived,
        topic: non_empty(&channel.topic.value),
        purpose: non_empty(&channel.purpose.value),
        created_at: from_unix_secs(channel.created),
        creator: non_empty(&channel.creator),
        num_members: channel.num_members,
    }
}

/// Assemble the export document.
#[must_use]
pub fn build_document(
    channel: &Channel,
    messages: &[ThreadedMessage],
    users: &BTreeMap<String, User>,
    statistics: ExportStatistics,
    options: &ExportOptions,
    exported_at: DateTime<Utc>,
) -> ExportDocument {
    let date_range = (!options.date_range.is_unbounded()).then_some(options.date_range);

    ExportDocument {
        export_info: ExportMetadata {
            exported_at,
            exported_by: EXPORTED_BY.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            export_format: options.format.as_str().to_string(),
            include_threads: options.include_threads,
            include_files: options.include_files,
            include_reactions: options.include_reactions,
            date_range,
        },
        channel: to_channel_info(channel),
        messages: messages.iter().map(to_export_message).collect(),
        users: users
            .iter()
            .map(|(id, user)| (id.clone(), to_export_user(user)))
            .collect(),
        statistics,
    }
}

/// Render the document as JSON bytes.
///
/// # Errors
/// Returns a JSON error if serialization fails.
pub fn render(document: &ExportDocument, format: OutputFormat) -> Result<Vec<u8>> {
    let rendered = match format {
        OutputFormat::JsonCompact => serde_json::to_vec(document),
        OutputFormat::Json | OutputFormat::JsonPretty => serde_json::to_vec_pretty(document),
    };
    rendered.map_err(AppError::json_parse)
}

/// `<dir>/<channel>-export-<YYYYmmdd-HHMMSS>.json`
#[must_use]
pub fn default_output_path(dir: &Path, channel_name: &str, now: DateTime<Utc>) -> PathBuf {
    let name: String = channel_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let name = if name.is_empty() { "channel".to_string() } else { name };

    dir.join(format!("{name}-export-{}.json", now.format("%Y%m%d-%H%M%S")))
}

/// Write rendered bytes to `path`, compressed as requested.
///
/// The file only appears at `path` once it is completely written. A failed
/// write leaves no partial file behind.
///
/// # Errors
/// Returns `Unsupported` for zip without touching the filesystem, or an IO
/// error if the file cannot be written.
pub fn write_output(path: &Path, bytes: &[u8], compression: Compression) -> Result<WrittenFile> {
    if compression == Compression::Zip {
        return Err(AppError::Unsupported {
            feature: "zip compression".to_string(),
        });
    }

    let path = match compression {
        Compression::Gzip => with_gz_suffix(path),
        Compression::None | Compression::Zip => path.to_path_buf(),
    };

    persist_with(&path, |file| encode(file, bytes, compression))?;

    let size = fs::metadata(&path)
        .map_err(|e| AppError::io(format!("Failed to stat {}", path.display()), e))?
        .len();

    debug!(raw_bytes = bytes.len(), "Rendered export");
    info!(path = %path.display(), size, compression = compression.as_str(), "Wrote export file");

    Ok(WrittenFile { path, size })
}

fn encode(file: &mut File, bytes: &[u8], compression: Compression) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    match compression {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(&mut writer, flate2::Compression::default());
            encoder.write_all(bytes)?;
            encoder.finish()?;
        }
        Compression::None | Compression::Zip => writer.write_all(bytes)?,
    }
    writer.flush()
}

/// Run `write` against a temp file next to `path`, then rename it into place.
fn persist_with(path: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| {
        AppError::io(format!("Failed to create output directory: {}", dir.display()), e)
    })?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| AppError::io(format!("Failed to create temp file in {}", dir.display()), e))?;

    // Dropping `temp` on the error path removes it.
    write(temp.as_file_mut())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))?;

    temp.persist(path)
        .map_err(|e| AppError::io(format!("Failed to move export into {}", path.display()), e.error))?;
    Ok(())
}

fn with_gz_suffix(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "gz") {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}
