//! Build script for HDRGammaFix
//! Embeds Windows resource metadata

fn main() {
    #[cfg(windows)]
    {
        let mut res = winresource::WindowsResource::new();
        res.set("FileDescription", "HDR Gamma Fix");
        res.set("ProductName", "HDR Gamma Fix");
        res.set("InternalName", "HDRGammaFix");
        res.set("OriginalFilename", "HDRGammaFix.exe");

        let icon = std::path::Path::new("../../Resources/DefaultIcon.ico");
        if icon.exists() {
            res.set_icon(&icon.to_string_lossy());
        }

        if let Err(e) = res.compile() {
            println!("cargo:warning=Failed to compile Windows resources: {}", e);
        }
    }
}
