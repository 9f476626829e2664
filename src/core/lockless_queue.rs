//! Lock-Free Single-Producer Single-Consumer (SPSC) Queue
//!
//! Antrian ukuran tetap untuk memindahkan data antara dua context yang
//! berjalan paralel (interrupt handler vs task, core 0 vs core 1).
//! Tidak ada Mutex, tidak ada alokasi setelah inisialisasi, tidak ada blocking.
//!
//! Queue di-split sekali menjadi [`Writer`] dan [`Reader`]. Keduanya tidak
//! bisa di-clone, jadi dua writer atau dua reader tidak mungkin ada.
//!
//! ```
//! use lockless::core::LocklessQueue;
//!
//! let mut queue: LocklessQueue<u32> = LocklessQueue::new(4);
//! let (mut writer, mut reader) = queue.split();
//!
//! assert!(writer.write(3));
//! assert!(writer.write(7));
//! assert!(writer.write(9));
//! assert!(!writer.write(11)); // Penuh: N - 1 slot terpakai
//!
//! assert_eq!(reader.read(), Some(3));
//! assert_eq!(reader.available(), 2);
//! ```

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::sync::Arc;

use super::indices::Indices;

/// Kapasitas minimum: satu slot selalu dibiarkan kosong
pub const MIN_CAPACITY: usize = 2;

/// Error konstruksi queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    /// Kapasitas < 2, queue tidak akan pernah bisa ditulis
    TooSmall(usize),
    /// Slot tidak muat dalam satu alokasi (termasuk `depth + 1` yang overflow)
    TooLarge(usize),
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::TooSmall(capacity) => write!(
                f,
                "queue capacity {} is below the minimum of {}",
                capacity, MIN_CAPACITY
            ),
            CapacityError::TooLarge(size) => {
                write!(f, "queue size {} exceeds the maximum allocation", size)
            }
        }
    }
}

impl std::error::Error for CapacityError {}

/// Lock-Free SPSC Queue
///
/// Menyimpan maksimal `capacity - 1` elemen. `T` harus `Copy` karena value
/// di-copy masuk dan keluar tanpa destructor.
pub struct LocklessQueue<T> {
    indices: Indices,
    // Pre-allocated buffer di heap - tidak ada alokasi setelah init
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: LocklessQueue aman untuk Send/Sync karena:
// - Hanya satu Writer (menulis write index)
// - Hanya satu Reader (menulis read index)
// - Atomic operations menjamin visibility slot
unsafe impl<T: Send> Send for LocklessQueue<T> {}
unsafe impl<T: Send> Sync for LocklessQueue<T> {}

impl<T: Copy> LocklessQueue<T> {
    /// Membuat queue dengan `capacity` slot (`capacity - 1` bisa dipakai).
    ///
    /// # Panics
    /// Panic jika `capacity < 2`
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(queue) => queue,
            Err(e) => panic!("{}", e),
        }
    }

    /// Seperti [`LocklessQueue::new`] tapi mengembalikan error untuk kapasitas < 2
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity < MIN_CAPACITY {
            return Err(CapacityError::TooSmall(capacity));
        }
        let bytes = capacity.checked_mul(std::mem::size_of::<UnsafeCell<MaybeUninit<T>>>());
        if bytes.map_or(true, |b| b > isize::MAX as usize) {
            return Err(CapacityError::TooLarge(capacity));
        }

        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }

        Ok(Self {
            indices: Indices::new(),
            slots: slots.into_boxed_slice(),
        })
    }

    /// Queue yang bisa menampung tepat `depth` elemen (`depth + 1` slot)
    ///
    /// # Panics
    /// Panic jika `depth == 0` atau `depth + 1` slot tidak bisa dialokasikan
    pub fn with_depth(depth: usize) -> Self {
        match Self::try_with_depth(depth) {
            Ok(queue) => queue,
            Err(e) => panic!("{}", e),
        }
    }

    /// Seperti [`LocklessQueue::with_depth`] tapi mengembalikan error
    pub fn try_with_depth(depth: usize) -> Result<Self, CapacityError> {
        let capacity = depth.checked_add(1).ok_or(CapacityError::TooLarge(depth))?;
        Self::try_new(capacity)
    }

    /// Jumlah slot (termasuk satu slot yang selalu kosong)
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Jumlah elemen yang bisa dibaca. Aman dari kedua context.
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.indices.available(self.capacity())
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Kosongkan queue. `&mut self` menjamin tidak ada Writer/Reader aktif.
    pub fn reset(&mut self) {
        self.indices.reset();
    }

    /// Split menjadi Writer dan Reader yang meminjam queue ini
    pub fn split(&mut self) -> (Writer<&Self>, Reader<&Self>) {
        let queue: &Self = self;
        (Writer { queue }, Reader { queue })
    }

    /// Split menjadi Writer dan Reader yang bisa dipindah ke thread lain
    pub fn into_split(self) -> (Writer<Arc<Self>>, Reader<Arc<Self>>) {
        let queue = Arc::new(self);
        (
            Writer {
                queue: Arc::clone(&queue),
            },
            Reader { queue },
        )
    }

    #[inline(always)]
    fn slot_ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.slots.as_ptr()).cast::<T>()
    }
}

impl<T> fmt::Debug for LocklessQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocklessQueue")
            .field("capacity", &self.slots.len())
            .field("available", &self.indices.available(self.slots.len()))
            .finish()
    }
}

/// Writer side: satu-satunya context yang boleh menulis
pub struct Writer<Q> {
    queue: Q,
}

impl<T, Q> Writer<Q>
where
    T: Copy,
    Q: Deref<Target = LocklessQueue<T>>,
{
    /// Tulis satu value.
    ///
    /// Returns `false` jika queue penuh (backpressure), state tidak berubah.
    /// Zero-allocation, lock-free, aman dari interrupt context.
    #[inline(always)]
    pub fn write(&mut self, value: T) -> bool {
        let queue = &*self.queue;
        // SAFETY: &mut self, Writer tidak bisa di-clone
        unsafe { queue.indices.push(queue.slot_ptr(), queue.capacity(), value) }
    }

    /// Tulis sebanyak mungkin dari `values`, returns jumlah yang masuk
    pub fn write_slice(&mut self, values: &[T]) -> usize {
        let mut written = 0;
        for &value in values {
            if !self.write(value) {
                break;
            }
            written += 1;
        }
        written
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.queue.indices.is_full(self.queue.capacity())
    }

    /// Jumlah slot yang bisa ditulis sekarang
    #[inline(always)]
    pub fn free(&self) -> usize {
        self.queue.indices.free(self.queue.capacity())
    }

    #[inline(always)]
    pub fn available(&self) -> usize {
        self.queue.available()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Reader side: satu-satunya context yang boleh membaca
pub struct Reader<Q> {
    queue: Q,
}

impl<T, Q> Reader<Q>
where
    T: Copy,
    Q: Deref<Target = LocklessQueue<T>>,
{
    /// Baca satu value, `None` jika kosong
    #[inline(always)]
    pub fn read(&mut self) -> Option<T> {
        let queue = &*self.queue;
        // SAFETY: &mut self, Reader tidak bisa di-clone
        unsafe { queue.indices.pop(queue.slot_ptr(), queue.capacity()) }
    }

    /// Lihat value berikutnya tanpa mengonsumsinya
    #[inline(always)]
    pub fn peek(&mut self) -> Option<T> {
        let queue = &*self.queue;
        // SAFETY: sama dengan read
        unsafe { queue.indices.peek(queue.slot_ptr()) }
    }

    /// Drain sampai `dst.len()` elemen, returns jumlah yang dibaca
    pub fn read_into(&mut self, dst: &mut [T]) -> usize {
        let mut len = 0;
        while len < dst.len() {
            match self.read() {
                Some(value) => {
                    dst[len] = value;
                    len += 1;
                }
                None => break,
            }
        }
        len
    }

    #[inline(always)]
    pub fn available(&self) -> usize {
        self.queue.available()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Writer yang memiliki queue lewat `Arc`
pub type OwnedWriter<T> = Writer<Arc<LocklessQueue<T>>>;
/// Reader yang memiliki queue lewat `Arc`
pub type OwnedReader<T> = Reader<Arc<LocklessQueue<T>>>;
