//! Memory-Mapped SPSC Queue untuk handoff antar proses
//!
//! Index dan slot berada di file yang di-mmap (`MAP_SHARED`), jadi writer dan
//! reader bisa berjalan di proses berbeda:
//! - Proses A membuka file lalu mengambil [`SharedWriter`]
//! - Proses B membuka file yang sama lalu mengambil [`SharedReader`]
//!
//! Protokol index sama persis dengan [`LocklessQueue`](super::LocklessQueue).

use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::indices::Indices;
use super::lockless_queue::MIN_CAPACITY;

/// Tipe yang valid untuk bit pattern apa pun dan tidak punya pointer.
///
/// # Safety
/// Implementor harus `repr(C)`/primitive tanpa padding yang bermakna,
/// tanpa pointer/reference, dan valid untuk semua bit pattern, karena isi
/// slot dibaca langsung dari file.
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($t:ty),*) => {
        $(unsafe impl Plain for $t {})*
    };
}

impl_plain!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

/// Header di awal mmap region
#[repr(C, align(64))]
struct QueueHeader {
    magic: AtomicU64, // 0 = baru, INITIALIZING = sedang diisi, MAGIC = siap
    version: u32,   // Versi format
    elem_size: u32, // size_of::<T>() saat file dibuat
    capacity: u64,  // Jumlah slot
    indices: Indices,
}

const MAGIC: u64 = 0x4C4F434B4C455351; // "LOCKLESQ" in hex
const INITIALIZING: u64 = 0x4C4F434B494E4954; // "LOCKINIT" in hex
const INIT_TIMEOUT: Duration = Duration::from_secs(1);
const VERSION: u32 = 1;
const HEADER_SIZE: usize = std::mem::size_of::<QueueHeader>();

/// Mmap-backed SPSC queue, belum memilih role
pub struct SharedQueue<T: Plain> {
    mmap: MmapMut,
    // Base pointer diambil sekali dari as_mut_ptr(), slot ditulis lewat pointer ini
    base: *mut u8,
    capacity: usize,
    _marker: PhantomData<T>,
}

// SAFETY: akses ke slot hanya lewat protokol index (lihat SharedWriter/SharedReader)
unsafe impl<T: Plain + Send> Send for SharedQueue<T> {}

impl<T: Plain> SharedQueue<T> {
    /// Membuat atau membuka queue di `path`
    ///
    /// # Arguments
    /// * `path` - Path ke file queue
    /// * `capacity` - Jumlah slot (`capacity - 1` bisa dipakai), minimal 2
    ///
    /// File yang sudah ada harus dibuat dengan `T` dan `capacity` yang sama,
    /// kalau tidak hasilnya `InvalidData`.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        if capacity < MIN_CAPACITY {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("queue capacity {} is below the minimum of {}", capacity, MIN_CAPACITY),
            ));
        }
        assert!(
            std::mem::align_of::<T>() <= 64,
            "element alignment must not exceed the 64-byte header alignment"
        );

        let total_size = capacity
            .checked_mul(std::mem::size_of::<T>())
            .and_then(|slots| slots.checked_add(HEADER_SIZE))
            .filter(|&size| size as u64 <= i64::MAX as u64)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("queue capacity {} overflows the mapping size", capacity),
                )
            })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let existing_len = file.metadata()?.len();
        if existing_len < total_size as u64 {
            file.set_len(total_size as u64)?;
        }

        // SAFETY: File sudah dibuka dengan read/write permission
        let mut mmap = unsafe { MmapOptions::new().len(total_size).map_mut(&file)? };

        let header = mmap.as_mut_ptr() as *mut QueueHeader;
        // SAFETY: mmap page-aligned dan minimal HEADER_SIZE bytes. Sebelum
        // magic == MAGIC hanya field magic yang boleh disentuh lewat reference.
        let magic = unsafe { &*std::ptr::addr_of!((*header).magic) };

        // Hanya satu opener yang menang 0 -> INITIALIZING dan mengisi header
        match magic.compare_exchange(0, INITIALIZING, Ordering::Acquire, Ordering::Acquire) {
            Ok(_) => {
                // SAFETY: opener lain menunggu sampai MAGIC di-publish
                unsafe {
                    addr_of_mut!((*header).version).write(VERSION);
                    addr_of_mut!((*header).elem_size).write(std::mem::size_of::<T>() as u32);
                    addr_of_mut!((*header).capacity).write(capacity as u64);
                    addr_of_mut!((*header).indices).write(Indices::new());
                }
                magic.store(MAGIC, Ordering::Release);
            }
            Err(_) => {
                wait_for_magic(magic)?;
                // SAFETY: MAGIC terlihat (Acquire), header sudah final
                validate_header(unsafe { &*header }, capacity, std::mem::size_of::<T>())?;
            }
        }

        let base = header as *mut u8;

        Ok(Self {
            mmap,
            base,
            capacity,
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    fn header(&self) -> &QueueHeader {
        // SAFETY: Header berada di awal mmap region dan sudah diinisialisasi di open()
        unsafe { &*(self.base as *const QueueHeader) }
    }

    #[inline(always)]
    fn slot_ptr(&self) -> *mut T {
        // SAFETY: HEADER_SIZE + capacity * size_of::<T>() sudah di-map
        unsafe { self.base.add(HEADER_SIZE) as *mut T }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn available(&self) -> usize {
        self.header().indices.available(self.capacity)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.header().indices.is_empty()
    }

    /// Reset kedua index. Pemanggil wajib memastikan proses lain tidak
    /// sedang memakai file ini.
    pub fn reset(&mut self) {
        self.header().indices.reset();
    }

    /// Sinkronkan mmap region ke disk
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }

    /// Ambil role writer untuk mapping ini
    pub fn into_writer(self) -> SharedWriter<T> {
        SharedWriter { queue: self }
    }

    /// Ambil role reader untuk mapping ini
    pub fn into_reader(self) -> SharedReader<T> {
        SharedReader { queue: self }
    }
}

/// Tunggu opener lain selesai mengisi header
fn wait_for_magic(magic: &AtomicU64) -> io::Result<()> {
    let deadline = Instant::now() + INIT_TIMEOUT;
    loop {
        match magic.load(Ordering::Acquire) {
            MAGIC => return Ok(()),
            INITIALIZING => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "queue file header is still being initialized",
                    ));
                }
                std::thread::yield_now();
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("not a queue file (magic {:#018x})", other),
                ))
            }
        }
    }
}

fn validate_header(header: &QueueHeader, capacity: usize, elem_size: usize) -> io::Result<()> {
    if header.version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported queue file version {}", header.version),
        ));
    }
    if header.elem_size as usize != elem_size || header.capacity != capacity as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "queue file layout mismatch: {} slots of {} bytes, expected {} slots of {} bytes",
                header.capacity, header.elem_size, capacity, elem_size
            ),
        ));
    }
    if !header.indices.in_range(capacity) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "queue file indices out of range",
        ));
    }
    Ok(())
}

/// Writer side dari [`SharedQueue`]
pub struct SharedWriter<T: Plain> {
    queue: SharedQueue<T>,
}

impl<T: Plain> SharedWriter<T> {
    /// Tulis satu value, `false` jika penuh
    #[inline(always)]
    pub fn write(&mut self, value: T) -> bool {
        let queue = &self.queue;
        // SAFETY: SharedWriter memiliki role writer untuk mapping ini
        unsafe {
            queue
                .header()
                .indices
                .push(queue.slot_ptr(), queue.capacity, value)
        }
    }

    pub fn is_full(&self) -> bool {
        self.queue.header().indices.is_full(self.queue.capacity)
    }

    pub fn available(&self) -> usize {
        self.queue.available()
    }

    pub fn flush(&self) -> io::Result<()> {
        self.queue.flush()
    }
}

/// Reader side dari [`SharedQueue`]
pub struct SharedReader<T: Plain> {
    queue: SharedQueue<T>,
}

impl<T: Plain> SharedReader<T> {
    /// Baca satu value, `None` jika kosong
    #[inline(always)]
    pub fn read(&mut self) -> Option<T> {
        let queue = &self.queue;
        // SAFETY: SharedReader memiliki role reader untuk mapping ini
        unsafe { queue.header().indices.pop(queue.slot_ptr(), queue.capacity) }
    }

    #[inline(always)]
    pub fn peek(&mut self) -> Option<T> {
        let queue = &self.queue;
        // SAFETY: sama dengan read
        unsafe { queue.header().indices.peek(queue.slot_ptr()) }
    }

    pub fn available(&self) -> usize {
        self.queue.available()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
