// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::core::{Channel, ChannelFlags, Hub};
use crate::errors::{ChannelError, ChannelResult};
use crate::observability::messages::backends::FileOpenNarrowed;
use crate::observability::messages::hub::HubCreated;
use crate::observability::messages::StructuredLog;
use crate::registry::Resolver;
use crate::traits::{ChannelClass, ClassRef, Hooks};

/// Channels over host files.
pub struct FileClass;

struct FileHub {
    path: PathBuf,
    create_missing: bool,
}

struct OpenFile {
    file: File,
}

#[derive(Clone, Copy)]
enum Mode {
    ReadWrite,
    Read,
    Write,
}

impl Mode {
    fn label(self) -> &'static str {
        match self {
            Mode::ReadWrite => "read-write",
            Mode::Read => "read-only",
            Mode::Write => "write-only",
        }
    }
}

impl FileClass {
    pub fn shared() -> ClassRef {
        Arc::new(FileClass)
    }

    async fn open_mode(hub: &FileHub, mode: Mode) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match mode {
            Mode::ReadWrite => options.read(true).write(true),
            Mode::Read => options.read(true),
            Mode::Write => options.write(true),
        };
        if hub.create_missing && !matches!(mode, Mode::Read) {
            options.create(true);
        }
        options.open(&hub.path).await
    }

    fn refused(error: &io::Error) -> bool {
        matches!(
            error.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
        )
    }
}

#[async_trait]
impl ChannelClass for FileClass {
    fn name(&self) -> &str {
        "file"
    }

    fn hooks(&self) -> Hooks {
        Hooks::FLUSH | Hooks::OPEN | Hooks::CLOSE | Hooks::CREATE_HUB
    }

    async fn read(&self, channel: &mut Channel, amount: usize) -> ChannelResult<Vec<u8>> {
        let open = channel.state_mut::<OpenFile>()?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(amount).map_err(|err| {
            ChannelError::ResourceExhausted(format!("read buffer of {} bytes: {}", amount, err))
        })?;
        buf.resize(amount, 0);
        let n = open.file.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn write(&self, channel: &mut Channel, buf: &[u8]) -> ChannelResult<usize> {
        let open = channel.state_mut::<OpenFile>()?;
        Ok(open.file.write(buf).await?)
    }

    async fn flush(&self, channel: &mut Channel) -> ChannelResult<()> {
        let open = channel.state_mut::<OpenFile>()?;
        open.file.flush().await?;
        open.file.sync_data().await?;
        Ok(())
    }

    /// Open the file in the widest mode the channel flags allow.
    ///
    /// A read-write open the host refuses is retried read-only, then
    /// write-only. The channel is narrowed to whichever succeeded.
    async fn open(&self, channel: &mut Channel) -> ChannelResult<()> {
        let hub = channel.hub()?;
        let spec = hub.hook::<FileHub>().ok_or_else(|| {
            ChannelError::InvalidArgument("file hub has no path".to_string())
        })?;

        let flags = channel.flags();
        let file = if flags.contains(ChannelFlags::READ_ONLY) {
            Self::open_mode(spec, Mode::Read).await?
        } else if flags.contains(ChannelFlags::WRITE_ONLY) {
            Self::open_mode(spec, Mode::Write).await?
        } else {
            match Self::open_mode(spec, Mode::ReadWrite).await {
                Ok(file) => file,
                Err(error) if Self::refused(&error) => {
                    let (file, narrowed) = match Self::open_mode(spec, Mode::Read).await {
                        Ok(file) => (file, ChannelFlags::READ_ONLY),
                        Err(_) => (
                            Self::open_mode(spec, Mode::Write).await?,
                            ChannelFlags::WRITE_ONLY,
                        ),
                    };
                    let mode = if narrowed == ChannelFlags::READ_ONLY {
                        Mode::Read
                    } else {
                        Mode::Write
                    };
                    FileOpenNarrowed {
                        path: &spec.path.to_string_lossy(),
                        mode: mode.label(),
                    }
                    .log();
                    channel.restrict(narrowed);
                    file
                }
                Err(error) => return Err(error.into()),
            }
        };

        drop(hub);
        channel.set_state(OpenFile { file });
        Ok(())
    }

    async fn close(&self, channel: &mut Channel) -> ChannelResult<()> {
        if let Some(mut open) = channel.take_state::<OpenFile>() {
            // buffered tokio writes are only guaranteed on disk after a flush
            open.file.flush().await?;
        }
        Ok(())
    }

    fn create_hub(
        self: Arc<Self>,
        resolver: &Resolver,
        name: &str,
        flags: ChannelFlags,
        _candidates: Option<&[ClassRef]>,
    ) -> ChannelResult<Hub> {
        if name.is_empty() {
            return Err(ChannelError::InvalidArgument(
                "file name is empty".to_string(),
            ));
        }

        let hook = FileHub {
            path: PathBuf::from(name),
            create_missing: resolver.config().file.create_missing,
        };
        let hub = Hub::alloc_with_hook(self, flags.generic(), Box::new(hook)).named(name);
        HubCreated {
            class: "file",
            name,
            children: 0,
        }
        .log();
        Ok(hub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use std::fs;
    use tempfile::tempdir;

    fn resolver(create_missing: bool) -> Resolver {
        let mut config = ChannelConfig::default();
        config.file.create_missing = create_missing;
        Resolver::new(config).without_loader()
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let name = format!("file:{}", path.display());
        let resolver = resolver(true);

        let hub = resolver.resolve(&name, ChannelFlags::NONE, None).unwrap();
        let mut channel = hub.open(ChannelFlags::WRITE_ONLY).await.unwrap();
        assert_eq!(channel.write(b"hello file").await.unwrap(), 10);
        channel.flush().await.unwrap();
        channel.close().await;
        assert_eq!(fs::read(&path).unwrap(), b"hello file");

        let mut channel = hub.open(ChannelFlags::READ_ONLY).await.unwrap();
        assert_eq!(channel.read(5).await.unwrap(), b"hello");
        assert_eq!(channel.read(64).await.unwrap(), b" file");
        assert!(channel.read(64).await.unwrap().is_empty());
        channel.close().await;
    }

    #[tokio::test]
    async fn test_oversized_read_reports_resource_exhaustion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.bin");
        fs::write(&path, b"tiny").unwrap();
        let hub = resolver(false)
            .resolve(&format!("file:{}", path.display()), ChannelFlags::NONE, None)
            .unwrap();

        let mut channel = hub.open(ChannelFlags::READ_ONLY).await.unwrap();
        let err = channel.read(usize::MAX).await.unwrap_err();
        assert!(matches!(err, ChannelError::ResourceExhausted(_)));
        // the channel is still usable
        assert_eq!(channel.read(4).await.unwrap(), b"tiny");
        channel.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_not_created_by_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");
        let hub = resolver(false)
            .resolve(&format!("file:{}", path.display()), ChannelFlags::NONE, None)
            .unwrap();

        let err = hub.open(ChannelFlags::WRITE_ONLY).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_write_open_narrows_to_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("ro.txt");
        fs::write(&path, b"locked").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        // root ignores permission bits
        if fs::OpenOptions::new().write(true).open(&path).is_ok() {
            return;
        }

        let hub = resolver(false)
            .resolve(&format!("file:{}", path.display()), ChannelFlags::NONE, None)
            .unwrap();
        let mut channel = hub.open(ChannelFlags::NONE).await.unwrap();
        assert!(channel.flags().contains(ChannelFlags::READ_ONLY));
        assert_eq!(channel.read(6).await.unwrap(), b"locked");

        let err = channel.write(b"x").await.unwrap_err();
        assert!(matches!(err, ChannelError::PermissionDenied { .. }));
        channel.close().await;
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let err = FileClass::shared()
            .create_hub(&resolver(false), "", ChannelFlags::NONE, None)
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument(_)));
    }
}
