// ABOUTME: Template files for the minimal React + Vite + Tailwind preview project
// ABOUTME: Rendered per backend, since only some backends need a dev-server host allow-list

/// Parameters that differ between backends
#[derive(Debug, Clone, PartialEq)]
pub struct ViteScaffold {
    pub port: u16,
    /// Extra hosts the dev server must accept; `None` leaves Vite's default
    pub allowed_hosts: Option<Vec<String>>,
}

impl ViteScaffold {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            allowed_hosts: None,
        }
    }

    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Relative path and content of every file in the project
    pub fn files(&self) -> Vec<(&'static str, String)> {
        vec![
            ("package.json", PACKAGE_JSON.to_string()),
            ("vite.config.js", self.vite_config()),
            ("tailwind.config.js", TAILWIND_CONFIG.to_string()),
            ("postcss.config.js", POSTCSS_CONFIG.to_string()),
            ("index.html", INDEX_HTML.to_string()),
            ("src/main.jsx", MAIN_JSX.to_string()),
            ("src/App.jsx", APP_JSX.to_string()),
            ("src/index.css", INDEX_CSS.to_string()),
        ]
    }

    fn vite_config(&self) -> String {
        let allowed_hosts = match &self.allowed_hosts {
            Some(hosts) => {
                let list: Vec<String> = hosts.iter().map(|h| format!("'{}'", h)).collect();
                format!("\n    allowedHosts: [{}],", list.join(", "))
            }
            None => String::new(),
        };

        format!(
            r#"import {{ defineConfig }} from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({{
  plugins: [react()],
  server: {{
    host: '0.0.0.0',
    port: {port},
    strictPort: true,
    hmr: false,{allowed_hosts}
  }}
}})
"#,
            port = self.port,
            allowed_hosts = allowed_hosts
        )
    }
}

const PACKAGE_JSON: &str = r#"{
  "name": "sandbox-app",
  "version": "1.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite --host",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0"
  },
  "devDependencies": {
    "@vitejs/plugin-react": "^4.0.0",
    "vite": "^4.3.9",
    "tailwindcss": "^3.3.0",
    "postcss": "^8.4.31",
    "autoprefixer": "^10.4.16"
  }
}
"#;

const TAILWIND_CONFIG: &str = r#"/** @type {import('tailwindcss').Config} */
export default {
  content: [
    "./index.html",
    "./src/**/*.{js,ts,jsx,tsx}",
  ],
  theme: {
    extend: {},
  },
  plugins: [],
}
"#;

const POSTCSS_CONFIG: &str = r#"export default {
  plugins: {
    tailwindcss: {},
    autoprefixer: {},
  },
}
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Sandbox App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.jsx"></script>
  </body>
</html>
"#;

const MAIN_JSX: &str = r#"import React from 'react'
import ReactDOM from 'react-dom/client'
import App from './App.jsx'
import './index.css'

ReactDOM.createRoot(document.getElementById('root')).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>,
)
"#;

const APP_JSX: &str = r#"function App() {
  return (
    <div className="min-h-screen bg-gray-900 text-white flex items-center justify-center p-4">
      <div className="text-center max-w-2xl">
        <p className="text-lg text-gray-400">
          Sandbox Ready<br/>
          Start building your React app with Vite and Tailwind CSS!
        </p>
      </div>
    </div>
  )
}

export default App
"#;

const INDEX_CSS: &str = r#"@tailwind base;
@tailwind components;
@tailwind utilities;

body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  background-color: rgb(17 24 39);
}
"#;
