//! Open modes for containers.

/// What the caller intends to do with a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn can_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// What other openers of the same container file are allowed to do.
///
/// Enforced with OS advisory locks on the container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShareMode {
    /// No lock taken
    DenyNone,
    /// Shared lock for readers, exclusive lock for writers
    DenyWrite,
    /// Exclusive lock
    Exclusive,
}

/// How to treat an existing / missing container file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with `NotFound` if the file does not exist
    OpenExisting,
    /// Fail with `AlreadyExists` if the file exists
    CreateNew,
    /// Open if present, create an empty container otherwise
    OpenOrCreate,
    /// Replace any existing file with an empty container
    Truncate,
}

impl CreateMode {
    pub fn creates(self) -> bool {
        !matches!(self, CreateMode::OpenExisting)
    }
}

/// Full open request for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub access: Access,
    pub share: ShareMode,
    pub create: CreateMode,
}

impl OpenMode {
    /// Open an existing container for reading
    pub fn read() -> Self {
        Self {
            access: Access::Read,
            share: ShareMode::Exclusive,
            create: CreateMode::OpenExisting,
        }
    }

    /// Open an existing container for reading and writing
    pub fn read_write() -> Self {
        Self {
            access: Access::ReadWrite,
            share: ShareMode::Exclusive,
            create: CreateMode::OpenExisting,
        }
    }

    /// Create a new container, failing if one exists
    pub fn create() -> Self {
        Self {
            access: Access::ReadWrite,
            share: ShareMode::Exclusive,
            create: CreateMode::CreateNew,
        }
    }

    /// Open for read/write, creating the container if missing
    pub fn open_or_create() -> Self {
        Self {
            access: Access::ReadWrite,
            share: ShareMode::Exclusive,
            create: CreateMode::OpenOrCreate,
        }
    }

    pub fn with_share(mut self, share: ShareMode) -> Self {
        self.share = share;
        self
    }

    pub fn with_create(mut self, create: CreateMode) -> Self {
        self.create = create;
        self
    }
}
