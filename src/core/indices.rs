//! Protokol index SPSC (Lamport queue dengan satu slot kosong)
//!
//! Dipakai bersama oleh [`LocklessQueue`](super::LocklessQueue) (slot di heap)
//! dan [`SharedQueue`](super::SharedQueue) (slot di mmap region).
//!
//! Aturan kepemilikan:
//! - `write` hanya di-store oleh writer, `read` hanya di-store oleh reader
//! - Writer memiliki slot `write` sampai index di-publish
//! - Reader memiliki slot `read` sampai value selesai di-copy

use std::sync::atomic::{AtomicUsize, Ordering};

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
pub(crate) struct CacheLinePadded<T> {
    pub(crate) value: T,
}

impl<T> CacheLinePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Pasangan index writer/reader, masing-masing di cache line sendiri.
///
/// Hanya load/store atomik yang dipakai (tanpa CAS), jadi tetap valid di
/// core yang cuma punya word load/store seperti Cortex-M0+.
#[repr(C)]
pub(crate) struct Indices {
    write: CacheLinePadded<AtomicUsize>,
    read: CacheLinePadded<AtomicUsize>,
}

impl Indices {
    pub(crate) const fn new() -> Self {
        Self {
            write: CacheLinePadded::new(AtomicUsize::new(0)),
            read: CacheLinePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline(always)]
    fn next(index: usize, capacity: usize) -> usize {
        let next = index + 1;
        if next == capacity {
            0
        } else {
            next
        }
    }

    /// Jumlah elemen yang bisa dibaca: `(N + write - read) mod N`
    ///
    /// Aman dari kedua context. Kedua index dibaca tanpa ordering satu sama
    /// lain, jadi hasilnya snapshot yang mungkin langsung basi.
    #[inline(always)]
    pub(crate) fn available(&self, capacity: usize) -> usize {
        let write = self.write.value.load(Ordering::Acquire);
        let read = self.read.value.load(Ordering::Acquire);

        // MOD tanpa division
        let count = capacity + write - read;
        if count >= capacity {
            count - capacity
        } else {
            count
        }
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.write.value.load(Ordering::Acquire) == self.read.value.load(Ordering::Acquire)
    }

    /// Slot yang bisa ditulis writer saat ini
    #[inline(always)]
    pub(crate) fn free(&self, capacity: usize) -> usize {
        capacity - 1 - self.available(capacity)
    }

    #[inline(always)]
    pub(crate) fn is_full(&self, capacity: usize) -> bool {
        let write = self.write.value.load(Ordering::Relaxed);
        Self::next(write, capacity) == self.read.value.load(Ordering::Acquire)
    }

    /// Push satu value (writer side)
    ///
    /// # Safety
    /// - Hanya boleh dipanggil dari satu writer pada satu waktu
    /// - `slots` harus valid untuk `capacity` elemen `T`
    #[inline(always)]
    pub(crate) unsafe fn push<T: Copy>(&self, slots: *mut T, capacity: usize, value: T) -> bool {
        let write = self.write.value.load(Ordering::Relaxed);
        let next = Self::next(write, capacity);

        // Acquire: reader sudah selesai copy slot ini sebelum index-nya maju
        if next == self.read.value.load(Ordering::Acquire) {
            return false;
        }

        slots.add(write).write(value);

        // Release: value harus visible sebelum write index di-update
        self.write.value.store(next, Ordering::Release);

        true
    }

    /// Lihat value berikutnya tanpa memajukan read index (reader side)
    ///
    /// # Safety
    /// Sama dengan [`Indices::pop`].
    #[inline(always)]
    pub(crate) unsafe fn peek<T: Copy>(&self, slots: *const T) -> Option<T> {
        let read = self.read.value.load(Ordering::Relaxed);

        if read == self.write.value.load(Ordering::Acquire) {
            return None;
        }

        Some(slots.add(read).read())
    }

    /// Pop satu value (reader side)
    ///
    /// # Safety
    /// - Hanya boleh dipanggil dari satu reader pada satu waktu
    /// - `slots` harus valid untuk `capacity` elemen `T`
    #[inline(always)]
    pub(crate) unsafe fn pop<T: Copy>(&self, slots: *const T, capacity: usize) -> Option<T> {
        let read = self.read.value.load(Ordering::Relaxed);

        // Acquire: pasangan dari Release di push, slot sudah ditulis penuh
        if read == self.write.value.load(Ordering::Acquire) {
            return None;
        }

        let value = slots.add(read).read();

        // Release: copy di atas selesai sebelum writer boleh menimpa slot
        self.read
            .value
            .store(Self::next(read, capacity), Ordering::Release);

        Some(value)
    }

    /// Reset kedua index ke 0.
    ///
    /// Tidak aman jika writer atau reader sedang aktif.
    pub(crate) fn reset(&self) {
        self.write.value.store(0, Ordering::Release);
        self.read.value.store(0, Ordering::Release);
    }

    /// Index harus berada di `[0, capacity)`, dipakai saat membuka mapping lama
    pub(crate) fn in_range(&self, capacity: usize) -> bool {
        self.write.value.load(Ordering::Acquire) < capacity
            && self.read.value.load(Ordering::Acquire) < capacity
    }
}
