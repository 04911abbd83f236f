//! RAII release guards for captured frames.
//!
//! A single generic guard covers video, audio and metadata: the
//! `CaptureKind` trait names the descriptor type and the release call, and
//! `RecvGuard<'rx, R, K>` calls it exactly once on drop. Because the guard
//! borrows the receiver, the receiver cannot be closed while a frame is out.

use std::{fmt, marker::PhantomData};

use crate::{
    frames::{AudioFrameRef, MetadataFrameRef, RawCapture, VideoFrameRef},
    transport::ReceiverHandle,
};

/// Sealed trait module to prevent external implementations of `CaptureKind`.
mod sealed {
    pub trait Sealed {}

    impl Sealed for super::VideoKind {}
    impl Sealed for super::AudioKind {}
    impl Sealed for super::MetadataKind {}
}

/// Frame-type-specific behavior for captured frames.
///
/// Implementations exist for [`VideoKind`], [`AudioKind`] and [`MetadataKind`].
pub trait CaptureKind: sealed::Sealed {
    /// The borrowed descriptor for this kind.
    type Frame: Copy + fmt::Debug;

    /// Return the frame to the transport.
    ///
    /// # Safety
    ///
    /// `frame` must have been produced by `receiver.capture` and not yet freed.
    unsafe fn release<R: ReceiverHandle + ?Sized>(receiver: &R, frame: &Self::Frame);
}

/// Marker type for video frames.
#[derive(Debug)]
pub struct VideoKind;

impl CaptureKind for VideoKind {
    type Frame = VideoFrameRef;

    unsafe fn release<R: ReceiverHandle + ?Sized>(receiver: &R, frame: &Self::Frame) {
        receiver.free_video(frame);
    }
}

/// Marker type for audio frames.
#[derive(Debug)]
pub struct AudioKind;

impl CaptureKind for AudioKind {
    type Frame = AudioFrameRef;

    unsafe fn release<R: ReceiverHandle + ?Sized>(receiver: &R, frame: &Self::Frame) {
        receiver.free_audio(frame);
    }
}

/// Marker type for metadata frames.
#[derive(Debug)]
pub struct MetadataKind;

impl CaptureKind for MetadataKind {
    type Frame = MetadataFrameRef;

    unsafe fn release<R: ReceiverHandle + ?Sized>(receiver: &R, frame: &Self::Frame) {
        receiver.free_metadata(frame);
    }
}

/// Owns one captured frame until it is dropped.
pub struct RecvGuard<'rx, R: ReceiverHandle + ?Sized, K: CaptureKind> {
    receiver: &'rx R,
    frame: K::Frame,
    _kind: PhantomData<K>,
}

impl<'rx, R: ReceiverHandle + ?Sized, K: CaptureKind> RecvGuard<'rx, R, K> {
    /// # Safety
    ///
    /// `frame` must have been produced by `receiver.capture`, be of kind `K`,
    /// and not be owned by any other guard.
    pub(crate) unsafe fn new(receiver: &'rx R, frame: K::Frame) -> Self {
        Self {
            receiver,
            frame,
            _kind: PhantomData,
        }
    }

    /// The captured descriptor. Valid for as long as the guard lives.
    pub fn frame(&self) -> &K::Frame {
        &self.frame
    }

    /// Releases the frame now.
    pub fn release(self) {
        drop(self);
    }
}

impl<R: ReceiverHandle + ?Sized, K: CaptureKind> Drop for RecvGuard<'_, R, K> {
    fn drop(&mut self) {
        // SAFETY: the constructor guarantees the frame is live and unshared
        unsafe {
            K::release(self.receiver, &self.frame);
        }
    }
}

impl<R: ReceiverHandle + ?Sized, K: CaptureKind> fmt::Debug for RecvGuard<'_, R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecvGuard")
            .field("frame", &self.frame)
            .finish()
    }
}

pub type RecvVideoGuard<'rx, R> = RecvGuard<'rx, R, VideoKind>;
pub type RecvAudioGuard<'rx, R> = RecvGuard<'rx, R, AudioKind>;
pub type RecvMetadataGuard<'rx, R> = RecvGuard<'rx, R, MetadataKind>;

/// A capture result whose frames release themselves.
#[derive(Debug)]
pub enum Captured<'rx, R: ReceiverHandle + ?Sized> {
    None,
    Video(RecvVideoGuard<'rx, R>),
    Audio(RecvAudioGuard<'rx, R>),
    Metadata(RecvMetadataGuard<'rx, R>),
    StatusChange,
    Error,
    /// An unhandled frame type; nothing to release.
    Other(u32),
}

impl<'rx, R: ReceiverHandle + ?Sized> Captured<'rx, R> {
    /// Wraps a raw capture from `receiver` in guards.
    ///
    /// # Safety
    ///
    /// `raw` must be the result of the most recent `receiver.capture` call and
    /// must not be wrapped twice.
    pub(crate) unsafe fn wrap(receiver: &'rx R, raw: RawCapture) -> Self {
        match raw {
            RawCapture::None => Captured::None,
            RawCapture::Video(frame) => Captured::Video(RecvGuard::new(receiver, frame)),
            RawCapture::Audio(frame) => Captured::Audio(RecvGuard::new(receiver, frame)),
            RawCapture::Metadata(frame) => Captured::Metadata(RecvGuard::new(receiver, frame)),
            RawCapture::StatusChange => Captured::StatusChange,
            RawCapture::Error => Captured::Error,
            RawCapture::Other(kind) => Captured::Other(kind),
        }
    }
}
