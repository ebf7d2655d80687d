#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaU8Image {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbaU8Image {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), 4 * width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn blank(width: usize, height: usize) -> Self {
        Self::new(width, height, vec![0; 4 * width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel(&self, x: usize, y: usize) -> [u8; 4] {
        let offset = 4 * (self.width * y + x);
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }

    pub fn write_to_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if self.is_empty() {
            bail!("cannot write a {}x{} image", self.width, self.height);
        }
        let w = BufWriter::new(File::create(path)?);
        let mut encoder = png::Encoder::new(w, self.width as u32, self.height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.data)?;
        Ok(())
    }

    fn blit(&mut self, src: &RgbaU8Image, x0: usize, y0: usize) {
        for y in 0..src.height {
            let src_offset = 4 * src.width * y;
            let dst_offset = 4 * (self.width * (y + y0) + x0);
            self.data[dst_offset..dst_offset + 4 * src.width]
                .copy_from_slice(&src.data[src_offset..src_offset + 4 * src.width]);
        }
    }

    /// Keeps the top-left `width` x `height` region.
    fn cropped(self, width: usize, height: usize) -> Self {
        if width == self.width && height == self.height {
            return self;
        }
        let mut data = Vec::with_capacity(4 * width * height);
        for y in 0..height {
            let offset = 4 * self.width * y;
            data.extend_from_slice(&self.data[offset..offset + 4 * width]);
        }
        Self::new(width, height, data)
    }
}

#[derive(Clone, Copy, Debug)]
struct FreeSpace {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

/// Claims the narrowest free space that fits a `width` x `height` patch. The leftover strip to
/// the right is as tall as the patch; the strip below spans the whole space.
fn place(free: &mut Vec<FreeSpace>, width: usize, height: usize) -> Option<[usize; 2]> {
    free.sort_by_key(|space| (space.width, space.height));
    let index = free
        .iter()
        .position(|space| space.width >= width && space.height >= height)?;
    let space = free.remove(index);

    if width < space.width {
        free.push(FreeSpace {
            x: space.x + width,
            y: space.y,
            width: space.width - width,
            height,
        });
    }
    if height < space.height {
        free.push(FreeSpace {
            x: space.x,
            y: space.y + height,
            width: space.width,
            height: space.height - height,
        });
    }
    Some([space.x, space.y])
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatchId(usize);

/// The result of baking: the atlas image, cropped to the bounding box of the placed patches, and
/// the top-left texel of every patch.
pub struct BakedAtlas {
    image: RgbaU8Image,
    offsets_by_patch_id: HashMap<PatchId, [usize; 2]>,
}

impl BakedAtlas {
    pub fn image(&self) -> &RgbaU8Image {
        &self.image
    }

    pub fn into_image(self) -> RgbaU8Image {
        self.image
    }

    pub fn width(&self) -> usize {
        self.image.width
    }

    pub fn height(&self) -> usize {
        self.image.height
    }

    pub fn offset(&self, patch_id: PatchId) -> Option<[usize; 2]> {
        self.offsets_by_patch_id.get(&patch_id).copied()
    }
}

#[derive(Default)]
pub struct TextureAtlas {
    patches: Vec<RgbaU8Image>,
}

impl TextureAtlas {
    pub fn new() -> Self {
        Self {
            patches: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn insert(&mut self, image: RgbaU8Image) -> PatchId {
        let id = PatchId(self.patches.len());
        self.patches.push(image);
        id
    }

    /// Packs every patch into a `width` x `height` canvas, largest first, with a guillotine split
    /// of the free space. Hands the atlas back if some patch does not fit.
    pub fn bake(self, width: usize, height: usize) -> Result<BakedAtlas, Self> {
        let mut canvas = RgbaU8Image::blank(width, height);
        let mut free = vec![FreeSpace {
            x: 0,
            y: 0,
            width,
            height,
        }];
        let mut bounds = [0, 0];

        let mut order: Vec<usize> = (0..self.patches.len()).collect();
        order.sort_by_key(|&index| {
            let patch = &self.patches[index];
            Reverse(patch.width * patch.height)
        });

        let mut offsets_by_patch_id = HashMap::new();
        for index in order {
            let patch = &self.patches[index];
            if patch.is_empty() {
                offsets_by_patch_id.insert(PatchId(index), [0, 0]);
                continue;
            }
            let [x, y] = match place(&mut free, patch.width, patch.height) {
                Some(offset) => offset,
                None => return Err(self),
            };
            canvas.blit(patch, x, y);
            bounds[0] = bounds[0].max(x + patch.width);
            bounds[1] = bounds[1].max(y + patch.height);
            offsets_by_patch_id.insert(PatchId(index), [x, y]);
        }

        Ok(BakedAtlas {
            image: canvas.cropped(bounds[0], bounds[1]),
            offsets_by_patch_id,
        })
    }

    /// Bakes into the smallest power-of-two canvas that holds every patch, growing alternately in
    /// width and height. Edges are capped at `max_dimension`; fails once a square canvas of that
    /// size is too small.
    pub fn bake_smallest(mut self, max_dimension: usize) -> Result<BakedAtlas> {
        let mut width = max_dimension.min(1);
        let mut height = max_dimension.min(1);
        loop {
            match self.bake(width, height) {
                Ok(result) => return Ok(result),
                Err(recovered) => self = recovered,
            }

            if width == max_dimension && height == max_dimension {
                bail!(
                    "unable to bake {} patches within {}x{}",
                    self.patches.len(),
                    max_dimension,
                    max_dimension,
                );
            }
            if width == height {
                width = (width * 2).min(max_dimension);
            } else {
                height = (height * 2).min(max_dimension);
            }
        }
    }
}
