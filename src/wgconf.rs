use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WgConfError {
    #[error("server config io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A slice of the server config file. Concatenating every segment's lines
/// reproduces the file exactly, so untouched content survives a
/// read-modify-write byte for byte.
enum Segment {
    Preamble(Vec<String>),
    Peer {
        public_key: Option<String>,
        lines: Vec<String>,
    },
}

impl Segment {
    fn lines(&self) -> &[String] {
        match self {
            Segment::Preamble(lines) => lines,
            Segment::Peer { lines, .. } => lines,
        }
    }
}

/// The interface-side peer list. Owns the on-disk file: peers are added and
/// removed in memory, `commit` writes the whole file back.
pub struct ServerConfig {
    path: PathBuf,
    segments: Vec<Segment>,
}

impl ServerConfig {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, WgConfError> {
        let path = path.into();
        let text = tokio::fs::read_to_string(&path).await?;

        Ok(Self {
            segments: parse(&text),
            path,
        })
    }

    /// Appends a `[Peer]` block, preceded by a `# <name>` comment.
    pub fn add_peer(&mut self, public_key: &str, name: &str, allowed_ip: &str) {
        self.segments.push(Segment::Peer {
            public_key: Some(public_key.to_owned()),
            lines: vec![
                String::new(),
                format!("# {name}"),
                "[Peer]".to_owned(),
                format!("PublicKey = {public_key}"),
                format!("AllowedIPs = {allowed_ip}"),
            ],
        });
    }

    /// Drops the block with the matching public key, leading comment
    /// included. Unknown keys are left alone.
    pub fn remove_peer(&mut self, public_key: &str) {
        self.segments.retain(
            |s| !matches!(s, Segment::Peer { public_key: Some(k), .. } if k == public_key),
        );
    }

    pub fn render(&self) -> String {
        let lines: Vec<&str> = self
            .segments
            .iter()
            .flat_map(|s| s.lines().iter().map(String::as_str))
            .collect();

        lines.join("\n")
    }

    pub async fn commit(&self) -> Result<(), WgConfError> {
        tokio::fs::write(&self.path, self.render()).await?;
        Ok(())
    }
}

fn is_annotation(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse(text: &str) -> Vec<Segment> {
    fn flush(
        segments: &mut Vec<Segment>,
        lines: &mut Vec<String>,
        in_peer: bool,
        key: &mut Option<String>,
    ) {
        if lines.is_empty() {
            return;
        }
        let taken = std::mem::take(lines);
        if in_peer {
            segments.push(Segment::Peer {
                public_key: key.take(),
                lines: taken,
            });
        } else {
            segments.push(Segment::Preamble(taken));
        }
    }

    let mut segments = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut key: Option<String> = None;
    let mut in_peer = false;

    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("[peer]") {
            // comments and blanks directly above the header belong to the block
            let mut lead = Vec::new();
            while matches!(lines.last(), Some(l) if is_annotation(l)) {
                lead.extend(lines.pop());
            }
            lead.reverse();

            flush(&mut segments, &mut lines, in_peer, &mut key);
            lines = lead;
            lines.push(line.to_owned());
            in_peer = true;
            key = None;
        } else if trimmed.starts_with('[') {
            flush(&mut segments, &mut lines, in_peer, &mut key);
            lines.push(line.to_owned());
            in_peer = false;
        } else {
            if in_peer && key.is_none() {
                if let Some((k, v)) = line.split_once('=') {
                    if k.trim().eq_ignore_ascii_case("publickey") {
                        key = Some(v.trim().to_owned());
                    }
                }
            }
            lines.push(line.to_owned());
        }
    }
    flush(&mut segments, &mut lines, in_peer, &mut key);

    segments
}
