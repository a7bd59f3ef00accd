use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use image::{ImageError, ImageReader};

use crate::{
    cache::ResourceCache,
    error::LoadError,
    fetch::ByteFetcher,
    index::{CacheKey, ResourceKind, VariantFlags},
};

pub type TextureCache = ResourceCache<TextureEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A decoded RGBA8 texture, ready for upload.
#[derive(Debug, Clone)]
pub struct TextureEntry {
    pub id: TextureId,
    pub path: String,
    pub size: (u32, u32),
    pub premultiplied: bool,
    pub pixels: Vec<u8>,
    pub source: Bytes,
}

impl TextureEntry {
    pub fn decode(path: &str, source: Bytes, variant: VariantFlags) -> Result<Self, ImageError> {
        let reader = ImageReader::new(Cursor::new(source.as_ref()));
        let image = reader.with_guessed_format()?.decode()?.into_rgba8();
        let size = image.dimensions();
        let mut pixels = image.into_vec();

        let premultiplied = variant.contains(VariantFlags::PREMULTIPLIED_ALPHA);
        if premultiplied {
            premultiply_alpha(&mut pixels);
        }

        Ok(Self {
            id: TextureId::next(),
            path: path.to_owned(),
            size,
            premultiplied,
            pixels,
            source,
        })
    }
}

fn premultiply_alpha(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        let alpha = u16::from(pixel[3]);
        for channel in &mut pixel[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
}

impl ResourceCache<TextureEntry> {
    pub fn release_texture(&self, id: TextureId) -> bool {
        self.release_where(|_, entry| entry.id == id) > 0
    }

    /// Releases the one entry decoded from `path` with `variant`. Other
    /// variants of the same file stay cached.
    pub fn release_path(&self, path: &str, variant: VariantFlags) -> bool {
        self.release(&CacheKey::new(ResourceKind::Texture, path, variant))
            .is_some()
    }
}

/// Fetches and decodes a texture through `cache`.
///
/// A cached `(path, variant)` resolves without touching `fetcher`, but the
/// caller still receives its own completion.
pub async fn acquire_texture<F: ByteFetcher + ?Sized>(
    cache: &TextureCache,
    fetcher: &F,
    path: &str,
    variant: VariantFlags,
) -> Result<Arc<TextureEntry>, LoadError> {
    let key = CacheKey::new(ResourceKind::Texture, path, variant);
    cache
        .acquire(key, || async move {
            let source = fetcher.fetch(path).await?;
            TextureEntry::decode(path, source, variant).map_err(|error| LoadError::parse(path, error))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fetch::MemoryFetcher, fixtures};

    #[test]
    fn decode_reports_dimensions() {
        let source = fixtures::png(3, 2, [10, 20, 30, 255]);
        let texture = TextureEntry::decode("a.png", source.clone(), VariantFlags::NONE).unwrap();

        assert_eq!(texture.size, (3, 2));
        assert_eq!(texture.pixels.len(), 3 * 2 * 4);
        assert_eq!(&texture.pixels[..4], &[10, 20, 30, 255]);
        assert_eq!(texture.source, source);
        assert!(!texture.premultiplied);
    }

    #[test]
    fn premultiplied_variant_scales_color_by_alpha() {
        let source = fixtures::png(1, 1, [200, 100, 50, 128]);
        let texture =
            TextureEntry::decode("a.png", source, VariantFlags::PREMULTIPLIED_ALPHA).unwrap();

        assert!(texture.premultiplied);
        assert_eq!(texture.pixels, vec![100, 50, 25, 128]);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = TextureEntry::decode("a.png", Bytes::from_static(b"nope"), VariantFlags::NONE);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cached_texture_is_not_fetched_again() {
        let fetcher = MemoryFetcher::new().with_file("a.png", fixtures::png(2, 2, [0, 0, 0, 255]));
        let cache = TextureCache::new();

        let first = acquire_texture(&cache, &fetcher, "a.png", VariantFlags::NONE)
            .await
            .unwrap();
        let second = acquire_texture(&cache, &fetcher, "a.png", VariantFlags::NONE)
            .await
            .unwrap();

        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(first.id, second.id);

        let premultiplied =
            acquire_texture(&cache, &fetcher, "a.png", VariantFlags::PREMULTIPLIED_ALPHA)
                .await
                .unwrap();
        assert_eq!(fetcher.fetch_count(), 2);
        assert_ne!(premultiplied.id, first.id);
        assert_eq!(cache.len(), 2);

        assert!(cache.release_texture(first.id));
        assert!(!cache.release_texture(first.id));
        assert!(!cache.release_path("a.png", VariantFlags::NONE));
        assert!(cache.release_path("a.png", VariantFlags::PREMULTIPLIED_ALPHA));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn release_path_keeps_other_variants() {
        let fetcher = MemoryFetcher::new().with_file("a.png", fixtures::png(1, 1, [9, 9, 9, 255]));
        let cache = TextureCache::new();
        for variant in [VariantFlags::NONE, VariantFlags::PREMULTIPLIED_ALPHA] {
            acquire_texture(&cache, &fetcher, "a.png", variant).await.unwrap();
        }

        assert!(cache.release_path("a.png", VariantFlags::NONE));
        assert_eq!(cache.len(), 1);
        let key = CacheKey::new(ResourceKind::Texture, "a.png", VariantFlags::PREMULTIPLIED_ALPHA);
        assert!(cache.contains(&key));

        acquire_texture(&cache, &fetcher, "a.png", VariantFlags::PREMULTIPLIED_ALPHA)
            .await
            .unwrap();
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_texture_is_not_cached() {
        let fetcher = MemoryFetcher::new().with_file("bad.png", &b"not a png"[..]);
        let cache = TextureCache::new();

        let missing = acquire_texture(&cache, &fetcher, "missing.png", VariantFlags::NONE).await;
        let bad = acquire_texture(&cache, &fetcher, "bad.png", VariantFlags::NONE).await;

        assert!(matches!(missing, Err(LoadError::Fetch(_))));
        assert!(matches!(bad, Err(LoadError::Parse { .. })));
        assert!(cache.is_empty());
    }
}
