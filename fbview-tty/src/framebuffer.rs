use std::fs::{self, File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use fbview_core::{DisplayBackend, Pixel};
use tracing::info;

pub const SYSFS_GRAPHICS: &str = "/sys/class/graphics";

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
/// `struct fb_var_screeninfo` is 40 32-bit fields; xres and yres come first.
const VAR_SCREENINFO_WORDS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferGeometry {
    pub rows: usize,
    pub cols: usize,
    pub bits_per_pixel: usize,
    /// Bytes per scanline.
    pub stride: usize,
}

impl FramebufferGeometry {
    /// Reads `virtual_size`, `bits_per_pixel` and `stride` from a sysfs
    /// device directory such as `/sys/class/graphics/fb0`.
    pub fn read(sysfs_dir: &Path) -> Result<Self> {
        let size = read_attribute(sysfs_dir, "virtual_size")?;
        let (cols, rows) = size
            .split_once(',')
            .ok_or_else(|| anyhow!("malformed virtual_size {:?}", size))?;
        let bits_per_pixel = read_attribute(sysfs_dir, "bits_per_pixel")?;
        let stride = read_attribute(sysfs_dir, "stride")?;
        Ok(Self {
            rows: parse_number(rows, "virtual_size")?,
            cols: parse_number(cols, "virtual_size")?,
            bits_per_pixel: parse_number(&bits_per_pixel, "bits_per_pixel")?,
            stride: parse_number(&stride, "stride")?,
        })
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel / 8
    }

    /// Narrows the size to the visible `cols` x `rows` when it fits inside
    /// the virtual size. Zero or oversized values leave it unchanged.
    pub fn with_visible(self, cols: usize, rows: usize) -> Self {
        if cols == 0 || rows == 0 || cols > self.cols || rows > self.rows {
            return self;
        }
        Self { rows, cols, ..self }
    }
}

/// Visible resolution as (cols, rows), when `file` is a framebuffer device.
fn visible_resolution(file: &File) -> Option<(usize, usize)> {
    let mut info = [0u32; VAR_SCREENINFO_WORDS];
    // SAFETY: `info` is large enough for the fb_var_screeninfo the kernel
    // fills in.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), FBIOGET_VSCREENINFO as _, info.as_mut_ptr()) };
    (rc == 0).then(|| (info[0] as usize, info[1] as usize))
}

fn read_attribute(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    let text = fs::read_to_string(&path).with_context(|| format!("failed to read {:?}", path))?;
    Ok(text.trim().to_string())
}

fn parse_number(text: &str, name: &str) -> Result<usize> {
    text.trim()
        .parse()
        .with_context(|| format!("invalid {} value {:?}", name, text))
}

/// A Linux framebuffer device written one scanline at a time.
pub struct FramebufferDisplay {
    device: File,
    path: PathBuf,
    geometry: FramebufferGeometry,
    scanline: Vec<u8>,
}

impl FramebufferDisplay {
    pub fn open(device: &Path) -> Result<Self> {
        let name = device
            .file_name()
            .ok_or_else(|| anyhow!("framebuffer path {:?} has no device name", device))?;
        let sysfs_dir = Path::new(SYSFS_GRAPHICS).join(name);
        Self::open_with_sysfs(device, &sysfs_dir)
    }

    pub fn open_with_sysfs(device: &Path, sysfs_dir: &Path) -> Result<Self> {
        let mut geometry = FramebufferGeometry::read(sysfs_dir)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .with_context(|| format!("failed to open framebuffer {:?}", device))?;
        if let Some((cols, rows)) = visible_resolution(&file) {
            geometry = geometry.with_visible(cols, rows);
        }
        info!(
            device = %device.display(),
            rows = geometry.rows,
            cols = geometry.cols,
            bpp = geometry.bits_per_pixel,
            "framebuffer opened"
        );
        Ok(Self {
            device: file,
            path: device.to_path_buf(),
            geometry,
            scanline: Vec::with_capacity(geometry.cols * geometry.bytes_per_pixel()),
        })
    }

    pub fn geometry(&self) -> FramebufferGeometry {
        self.geometry
    }
}

impl DisplayBackend for FramebufferDisplay {
    fn rows(&self) -> usize {
        self.geometry.rows
    }

    fn cols(&self) -> usize {
        self.geometry.cols
    }

    fn pixel_size(&self) -> usize {
        self.geometry.bytes_per_pixel()
    }

    fn commit_row(&mut self, row: usize, col: usize, pixels: &[Pixel]) -> Result<()> {
        if row >= self.geometry.rows || col + pixels.len() > self.geometry.cols {
            bail!(
                "row {} [{}..{}) outside {}x{} framebuffer",
                row,
                col,
                col + pixels.len(),
                self.geometry.rows,
                self.geometry.cols
            );
        }
        self.scanline.clear();
        for pixel in pixels {
            self.scanline.extend_from_slice(&pixel.to_ne_bytes());
        }
        let offset = row * self.geometry.stride + col * self.geometry.bytes_per_pixel();
        self.device
            .write_all_at(&self.scanline, offset as u64)
            .with_context(|| format!("failed to write row {} to {:?}", row, self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbview_core::rgb;
    use tempfile::{tempdir, TempDir};

    fn fake_device(cols: usize, rows: usize, stride: usize) -> (TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let sysfs = dir.path().join("fb0");
        fs::create_dir(&sysfs).unwrap();
        fs::write(sysfs.join("virtual_size"), format!("{cols},{rows}\n")).unwrap();
        fs::write(sysfs.join("bits_per_pixel"), "32\n").unwrap();
        fs::write(sysfs.join("stride"), format!("{stride}\n")).unwrap();
        let device = dir.path().join("dev-fb0");
        fs::write(&device, vec![0u8; stride * rows]).unwrap();
        (dir, sysfs, device)
    }

    #[test]
    fn geometry_comes_from_sysfs() {
        let (_dir, sysfs, _) = fake_device(800, 600, 3328);
        let geometry = FramebufferGeometry::read(&sysfs).unwrap();
        assert_eq!(
            geometry,
            FramebufferGeometry {
                rows: 600,
                cols: 800,
                bits_per_pixel: 32,
                stride: 3328,
            }
        );
        assert_eq!(geometry.bytes_per_pixel(), 4);
    }

    #[test]
    fn malformed_size_is_rejected() {
        let (_dir, sysfs, _) = fake_device(4, 4, 16);
        fs::write(sysfs.join("virtual_size"), "800x600").unwrap();
        assert!(FramebufferGeometry::read(&sysfs).is_err());
    }

    #[test]
    fn visible_size_replaces_double_buffered_virtual_size() {
        let (_dir, sysfs, _) = fake_device(800, 1200, 3200);
        let geometry = FramebufferGeometry::read(&sysfs).unwrap().with_visible(800, 600);
        assert_eq!((geometry.rows, geometry.cols, geometry.stride), (600, 800, 3200));
    }

    #[test]
    fn unusable_visible_size_keeps_virtual_size() {
        let (_dir, sysfs, _) = fake_device(800, 600, 3200);
        let geometry = FramebufferGeometry::read(&sysfs).unwrap();
        assert_eq!(geometry.with_visible(0, 0), geometry);
        assert_eq!(geometry.with_visible(1024, 600), geometry);
        assert_eq!(geometry.with_visible(800, 768), geometry);
    }

    #[test]
    fn rows_land_at_stride_offsets() {
        let (_dir, sysfs, device) = fake_device(3, 4, 16);
        let mut display = FramebufferDisplay::open_with_sysfs(&device, &sysfs).unwrap();
        assert_eq!((display.rows(), display.cols(), display.pixel_size()), (4, 3, 4));
        assert_eq!(display.geometry().stride, 16);

        let red = rgb(255, 0, 0);
        display.commit_row(2, 0, &[red, 0, red]).unwrap();
        display.commit_row(3, 2, &[red]).unwrap();

        let bytes = fs::read(&device).unwrap();
        assert_eq!(&bytes[32..36], &red.to_ne_bytes());
        assert_eq!(&bytes[36..40], &[0, 0, 0, 0]);
        assert_eq!(&bytes[40..44], &red.to_ne_bytes());
        assert_eq!(&bytes[56..60], &red.to_ne_bytes());
        assert!(bytes[..32].iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_bounds_row_is_an_error() {
        let (_dir, sysfs, device) = fake_device(3, 2, 12);
        let mut display = FramebufferDisplay::open_with_sysfs(&device, &sysfs).unwrap();
        assert!(display.commit_row(2, 0, &[0, 0, 0]).is_err());
        assert!(display.commit_row(0, 1, &[0, 0, 0]).is_err());
    }
}
