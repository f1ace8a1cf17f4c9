//! Install manifest, landing page and the url layout of a session.

use uuid::Uuid;

use crate::config::InstallerConfig;
use crate::models::AppInfoPresentable;

pub const SMALL_ICON_PATH: &str = "/app57x57.png";
pub const LARGE_ICON_PATH: &str = "/app512x512.png";
pub const INSTALL_PATH: &str = "/install";

/// paths and absolute urls served by one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    manifest_path: String,
    payload_path: String,
}

impl Endpoints {
    pub fn new(session_id: Uuid, config: &InstallerConfig, port: u16) -> Self {
        Self {
            base_url: format!(
                "{}://{}:{}",
                config.server_method.scheme(),
                config.url_host(),
                port
            ),
            manifest_path: format!("/{}.plist", session_id),
            payload_path: format!("/{}.ipa", session_id),
        }
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    pub fn payload_path(&self) -> &str {
        &self.payload_path
    }

    pub fn small_icon_path(&self) -> &str {
        SMALL_ICON_PATH
    }

    pub fn large_icon_path(&self) -> &str {
        LARGE_ICON_PATH
    }

    pub fn install_path(&self) -> &str {
        INSTALL_PATH
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `itms-services` link that makes the device fetch the manifest
    pub fn install_link(&self) -> String {
        format!(
            "itms-services://?action=download-manifest&url={}",
            urlencoding::encode(&self.url(&self.manifest_path))
        )
    }
}

/// render the install manifest property list for `app`
pub fn install_manifest(app: &dyn AppInfoPresentable, endpoints: &Endpoints) -> String {
    let asset = |kind: &str, url: String| {
        format!(
            "\t\t\t\t<dict>\n\
             \t\t\t\t\t<key>kind</key>\n\
             \t\t\t\t\t<string>{}</string>\n\
             \t\t\t\t\t<key>url</key>\n\
             \t\t\t\t\t<string>{}</string>\n\
             \t\t\t\t</dict>\n",
            kind,
            xml_escape(&url)
        )
    };

    let mut assets = String::new();
    assets.push_str(&asset("software-package", endpoints.url(endpoints.payload_path())));
    assets.push_str(&asset("display-image", endpoints.url(endpoints.small_icon_path())));
    assets.push_str(&asset("full-size-image", endpoints.url(endpoints.large_icon_path())));

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n\
         <dict>\n\
         \t<key>items</key>\n\
         \t<array>\n\
         \t\t<dict>\n\
         \t\t\t<key>assets</key>\n\
         \t\t\t<array>\n\
         {}\
         \t\t\t</array>\n\
         \t\t\t<key>metadata</key>\n\
         \t\t\t<dict>\n\
         \t\t\t\t<key>bundle-identifier</key>\n\
         \t\t\t\t<string>{}</string>\n\
         \t\t\t\t<key>bundle-version</key>\n\
         \t\t\t\t<string>{}</string>\n\
         \t\t\t\t<key>kind</key>\n\
         \t\t\t\t<string>software</string>\n\
         \t\t\t\t<key>title</key>\n\
         \t\t\t\t<string>{}</string>\n\
         \t\t\t</dict>\n\
         \t\t</dict>\n\
         \t</array>\n\
         </dict>\n\
         </plist>\n",
        assets,
        xml_escape(app.identifier()),
        xml_escape(app.version()),
        xml_escape(app.name()),
    )
}

/// landing page that hands the browser over to the install link
pub fn landing_page(app: &dyn AppInfoPresentable, endpoints: &Endpoints) -> String {
    let link = xml_escape(&endpoints.install_link());
    let name = xml_escape(app.name());
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <meta http-equiv=\"refresh\" content=\"0;url={link}\">\n\
         <title>Install {name}</title>\n\
         </head>\n\
         <body>\n\
         <p><a href=\"{link}\">Install {name}</a></p>\n\
         </body>\n\
         </html>\n"
    )
}

pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
